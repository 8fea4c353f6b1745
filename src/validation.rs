//! Request binding and field validation helpers.

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::{error, warn};

use crate::{
    error::{ApiError, ErrCode},
    middleware::request_id,
};

/// Checks performed after a payload has been deserialized.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

/// JSON body extractor that also runs [`Validate`].
///
/// Both deserialization and validation failures answer 400 with a
/// plain-text message.
#[derive(Debug, Clone)]
pub struct Valid<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let request_id = request_id(&parts).unwrap_or_default().to_owned();
        let req = Request::from_parts(parts, body);

        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                let msg = lower_first(&rejection.body_text());
                error!(error = %msg, request_id = %request_id, "bind error");
                ApiError::new(ErrCode::BadRequest, msg)
            })?;

        if let Err(e) = value.validate() {
            warn!(error = %e, request_id = %request_id, "valid form error");
            return Err(ApiError::new(ErrCode::BadRequest, e.msg()));
        }

        Ok(Valid(value))
    }
}

/// Parses an integer request parameter, answering 400 when it is malformed.
pub fn parse_int(key: &str, value: &str) -> Result<i64, ApiError> {
    value.trim().parse::<i64>().map_err(|e| {
        error!(key, value, "bad int parameter");
        ApiError::bad_request(e, "invalid parameter").with_context(key, value)
    })
}

/// Integer lookup in a `Query<HashMap<String, String>>`. A missing key is malformed.
pub fn int_query(query: &HashMap<String, String>, key: &str) -> Result<i64, ApiError> {
    parse_int(key, query.get(key).map(String::as_str).unwrap_or_default())
}

/// Lower-cases the first character. Blank strings come back unchanged.
pub fn lower_first(s: &str) -> String {
    if s.trim().is_empty() {
        return s.to_string();
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_first_only_touches_first_char() {
        assert_eq!(lower_first("Name is required"), "name is required");
        assert_eq!(lower_first("Émile"), "émile");
        assert_eq!(lower_first("   "), "   ");
        assert_eq!(lower_first(""), "");
    }

    #[test]
    fn int_parsing() {
        assert_eq!(parse_int("page", " 42 ").unwrap(), 42);

        let err = parse_int("page", "abc").unwrap_err();
        assert_eq!(err.code(), ErrCode::BadRequest);
        assert_eq!(err.msg(), "invalid parameter");
        assert_eq!(err.context()["page"], "abc");

        let query = HashMap::from([("size".to_string(), "20".to_string())]);
        assert_eq!(int_query(&query, "size").unwrap(), 20);
        assert!(int_query(&query, "page").is_err());
    }
}
