use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-wide error taxonomy.
///
/// Every handler maps failures into one of these variants, so the wire
/// envelope always carries a stable machine-readable `code` instead of
/// per-endpoint ad hoc strings.
#[derive(Debug)]
pub enum AppError {
    /// Input failed validation (malformed CNPJ, bad phone, etc).
    InvalidInput(String),
    /// Request is structurally wrong (missing fields, bad combination).
    BadRequest(String),
    /// Resource not found.
    NotFound(String),
    /// Enrichment not allowed in the current context.
    ContextDenied(String),
    /// An upstream provider failed or timed out.
    ProviderDown(String),
    /// Score calculation failed.
    CalcError(String),
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Everything else.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Stable error code string for the JSON envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ContextDenied(_) => "CONTEXT_DENIED",
            AppError::ProviderDown(_) => "PROVIDER_DOWN",
            AppError::CalcError(_) => "CALC_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
            AppError::WithContext { source, .. } => source.code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ContextDenied(_) => StatusCode::FORBIDDEN,
            AppError::ProviderDown(_) => StatusCode::BAD_GATEWAY,
            AppError::CalcError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::WithContext { source, .. } => source.status(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ContextDenied(msg) => write!(f, "Context denied: {}", msg),
            AppError::ProviderDown(msg) => write!(f, "Provider error: {}", msg),
            AppError::CalcError(msg) => write!(f, "Calculation error: {}", msg),
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into the `{ok:false, code, message}` envelope.
    ///
    /// Client-caused errors (4xx) echo their message; server-side errors
    /// are logged in full and return a generic message.
    fn into_response(self) -> Response {
        if let AppError::WithContext { source, context } = &self {
            tracing::error!("Error with context: {} -> {}", context, source);
            return source.clone().into_response();
        }

        let status = self.status();
        let message = match &self {
            AppError::InvalidInput(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::ContextDenied(msg) => msg.clone(),
            AppError::ProviderDown(msg) => {
                tracing::error!("Provider error: {}", msg);
                "External provider error".to_string()
            }
            AppError::CalcError(msg) => {
                tracing::error!("Calculation error: {}", msg);
                "Score calculation failed".to_string()
            }
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::WithContext { .. } => unreachable!(),
        };

        let body = Json(json!({
            "ok": false,
            "code": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

// Make AppError cloneable for WithContext variant
impl Clone for AppError {
    /// Note: `sqlx::Error` is not cloneable, so `DatabaseError` is simplified
    /// to `RowNotFound` during cloning.
    fn clone(&self) -> Self {
        match self {
            AppError::InvalidInput(msg) => AppError::InvalidInput(msg.clone()),
            AppError::BadRequest(msg) => AppError::BadRequest(msg.clone()),
            AppError::NotFound(msg) => AppError::NotFound(msg.clone()),
            AppError::ContextDenied(msg) => AppError::ContextDenied(msg.clone()),
            AppError::ProviderDown(msg) => AppError::ProviderDown(msg.clone()),
            AppError::CalcError(msg) => AppError::CalcError(msg.clone()),
            AppError::DatabaseError(_e) => AppError::DatabaseError(sqlx::Error::RowNotFound),
            AppError::InternalError(msg) => AppError::InternalError(msg.clone()),
            AppError::WithContext { source, context } => AppError::WithContext {
                source: source.clone(),
                context: context.clone(),
            },
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ProviderDown(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    #[allow(dead_code)]
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AppError::InvalidInput("x".into()).code(), "INVALID_INPUT");
        assert_eq!(AppError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(AppError::ProviderDown("x".into()).code(), "PROVIDER_DOWN");
        assert_eq!(AppError::CalcError("x".into()).code(), "CALC_ERROR");
    }

    #[test]
    fn context_preserves_underlying_code() {
        let err: Result<(), AppError> = Err(AppError::ProviderDown("timeout".into()));
        let wrapped = err.context("calling ReceitaWS").unwrap_err();
        assert_eq!(wrapped.code(), "PROVIDER_DOWN");
    }

    #[test]
    fn invalid_input_maps_to_422() {
        let resp = AppError::InvalidInput("bad cnpj".into()).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
