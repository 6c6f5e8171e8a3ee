use http::StatusCode;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The submitted token was missing, malformed, or not derived from the session secret.
    #[error("csrf validation error")]
    Validation,
    /// `salt_byte_length` was outside `1..=255`.
    #[error("salt byte length must be between 1 and 255, got {0}")]
    SaltByteLength(usize),
    /// `secret_byte_length` was outside `1..=255`.
    #[error("secret byte length must be between 1 and 255, got {0}")]
    SecretByteLength(usize),
    /// The field name matcher couldn't be compiled.
    #[error("invalid token field name: {0}")]
    FieldName(#[from] regex::Error),
    /// A configured header name isn't a valid HTTP header name.
    #[error(transparent)]
    HeaderName(#[from] http::header::InvalidHeaderName),
    /// The request body couldn't be read.
    #[error("couldn't read request body: {0}")]
    Body(#[source] BoxError),
    /// The request body was larger than the configured `body_limit`.
    #[error("request body exceeds the {0} byte limit")]
    BodyTooLarge(usize),
    /// An expected extension was missing.
    #[error("couldn't extract `{0}`. is `CsrfLayer` enabled?")]
    ExtensionNotFound(String),
    /// No token was minted for this request.
    #[error("no csrf token for this request. is the path excluded, or is `CsrfLayer` missing?")]
    NoToken,
}

impl Error {
    /// Whether this is the recoverable validation failure hosts usually answer with a 403.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation)
    }

    pub(crate) fn make_layer_error<T: Default, E>(
        err: impl std::error::Error,
    ) -> Result<http::Response<T>, E> {
        tracing::error!(err = %err);

        let mut response = http::Response::default();
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;

        Ok(response)
    }

    /// Status a host should answer with when protection fails with this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::FORBIDDEN,
            Self::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn make_layer_rejection<T: Default, E>(
        status: StatusCode,
    ) -> Result<http::Response<T>, E> {
        let mut response = http::Response::default();
        *response.status_mut() = status;

        Ok(response)
    }
}
