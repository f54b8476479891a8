pub const INDEX_HTML: &str = include_str!("../frontend/index.html");
