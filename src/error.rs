use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use tracing::error;

/// Application error codes. Most map one-to-one onto HTTP statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrCode {
    Ok,
    NotModified,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Internal,
    /// Internal error raised while recovering from a panic.
    Panic,
}

impl ErrCode {
    pub fn value(self) -> u16 {
        match self {
            ErrCode::Ok => 0,
            ErrCode::NotModified => 304,
            ErrCode::BadRequest => 400,
            ErrCode::Unauthorized => 401,
            ErrCode::Forbidden => 403,
            ErrCode::NotFound => 404,
            ErrCode::Internal => 500,
            ErrCode::Panic => 590,
        }
    }

    pub fn is_ok(self) -> bool {
        self == ErrCode::Ok
    }

    /// Status written to the client. Codes above 500 collapse to 500.
    pub fn status(self) -> StatusCode {
        let code = self.value();
        if code > 500 {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
    }
}

/// Error note attached to a response's extensions so that the access log
/// can report what went wrong without it being part of the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNote(pub String);

#[derive(Debug)]
pub struct ApiError {
    code: ErrCode,
    msg: String,
    context: Map<String, Value>,
    source: Option<anyhow::Error>,
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(
                f,
                "{}:{}:{:#}",
                self.msg,
                Value::Object(self.context.clone()),
                source
            ),
            None => f.write_str(&self.msg),
        }
    }
}

impl ApiError {
    pub fn new(code: ErrCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            context: Map::new(),
            source: None,
        }
    }

    pub fn wrap(code: ErrCode, source: impl Into<anyhow::Error>, msg: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::new(code, msg)
        }
    }

    pub fn bad_request(source: impl Into<anyhow::Error>, msg: impl Into<String>) -> Self {
        Self::wrap(ErrCode::BadRequest, source, msg)
    }

    pub fn not_found(source: impl Into<anyhow::Error>, msg: impl Into<String>) -> Self {
        Self::wrap(ErrCode::NotFound, source, msg)
    }

    pub fn forbidden(source: impl Into<anyhow::Error>, msg: impl Into<String>) -> Self {
        Self::wrap(ErrCode::Forbidden, source, msg)
    }

    pub fn unauthorized(source: impl Into<anyhow::Error>, msg: impl Into<String>) -> Self {
        Self::wrap(ErrCode::Unauthorized, source, msg)
    }

    pub fn internal(source: impl Into<anyhow::Error>, msg: impl Into<String>) -> Self {
        Self::wrap(ErrCode::Internal, source, msg)
    }

    pub fn panic(source: impl Into<anyhow::Error>, msg: impl Into<String>) -> Self {
        Self::wrap(ErrCode::Panic, source, msg)
    }

    /// Adds a key/value pair that is logged alongside the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn code(&self) -> ErrCode {
        self.code
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api) => api,
            Err(err) => ApiError::internal(err, "service error, please retry later"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        let context = Value::Object(self.context.clone());

        if self.code.value() >= 500 {
            error!(err = %detail, context = %context, "panic {}", self.msg);
        } else {
            error!(err = %detail, context = %context, "{}", self.msg);
        }

        let mut response = (self.code.status(), self.msg).into_response();
        response.extensions_mut().insert(ErrorNote(detail));
        response
    }
}

/// User-facing message for an error: the `ApiError` message when there is one,
/// the plain `Display` otherwise.
pub fn error_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ApiError>() {
        Some(api) => api.msg().to_string(),
        None => err.to_string(),
    }
}
