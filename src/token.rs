/// The token minted for the current request.
///
/// Inserted into the request extensions by [`CsrfLayer`](crate::CsrfLayer) and
/// also sent back in the configured response header. Embed it in forms or
/// hand it to scripts so the next mutating request can echo it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    value: String,
}

impl Token {
    pub(crate) fn new(value: String) -> Self {
        Self { value }
    }

    pub fn get(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

#[cfg(feature = "axum")]
mod axum_impl {
    use async_trait::async_trait;
    use axum_core::{
        extract::FromRequestParts,
        response::{IntoResponse, Response},
    };
    use http::request::Parts;

    use super::Token;
    use crate::Error;

    /// Fails with [`Error::NoToken`] on paths excluded from protection, where
    /// no token is minted. Extract `Option<Token>` on routes that may be excluded.
    #[async_trait]
    impl<S> FromRequestParts<S> for Token
    where
        S: Send + Sync,
    {
        type Rejection = Error;

        async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
            parts
                .extensions
                .get::<Token>()
                .cloned()
                .ok_or(Error::NoToken)
        }
    }

    impl IntoResponse for Error {
        fn into_response(self) -> Response {
            (self.status(), self.to_string()).into_response()
        }
    }
}
