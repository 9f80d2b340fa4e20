use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::errors::AppError;

/// JSON body extractor whose rejections are validation errors naming the
/// offending field path.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|err| AppError::invalid_field("body", err.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::invalid_field("body", "request body is empty"));
        }

        parse_body(&bytes).map(ApiJson)
    }
}

fn parse_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut de).map_err(|err| {
        let path = err.path().to_string();
        let unparseable = matches!(err.inner().classify(), Category::Syntax | Category::Eof);
        let field = if unparseable || matches!(path.as_str(), "" | "." | "?") {
            "body".to_string()
        } else {
            path
        };
        AppError::validation(format!("invalid value for {field}: {}", err.inner()), vec![field])
    })
}
