use axum::extract::State;
use axum::response::Html;

use crate::assets::INDEX_HTML;
use crate::AppState;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(inject_base_path(INDEX_HTML, &state.base_path))
}

fn inject_base_path(html: &str, base_path: &str) -> String {
    let script = format!(r#"<script>window.BASE_PATH = "{}";</script>"#, base_path);
    html.replacen("<head>", &format!("<head>\n    {}", script), 1)
}
