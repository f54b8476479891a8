use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use tracing::debug;

/// JSON body that never rejects.
///
/// A missing, malformed or wrongly shaped body yields `T::default()` so the
/// handler's own validation decides the response.
pub struct LenientJson<T>(pub T);

impl<S, T> FromRequest<S> for LenientJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let value = match Bytes::from_request(req, state).await {
            Ok(body) => serde_json::from_slice(&body).unwrap_or_else(|err| {
                debug!(error = %err, "Ignoring unparseable request body");
                T::default()
            }),
            Err(err) => {
                debug!(error = %err, "Ignoring unreadable request body");
                T::default()
            }
        };

        Ok(LenientJson(value))
    }
}
