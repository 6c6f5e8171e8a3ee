use std::sync::Arc;

use crate::{
    codec::{self, Codec},
    lookup,
    request::{build_cookie, CookieJar, CsrfRequest},
    Config, Error,
};

/// Runs the double-submit check for one request and mints the token for its
/// response.
///
/// Holds no per-request state, so a single instance can be shared by every
/// request a host handles.
#[derive(Clone)]
pub struct CsrfProtect {
    config: Arc<Config>,
    codec: Codec,
}

impl CsrfProtect {
    pub fn new(config: Config) -> Self {
        Self::with_codec(config, Codec::default())
    }

    pub fn with_codec(config: Config, codec: Codec) -> Self {
        Self {
            config: Arc::new(config),
            codec,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the encoded token to publish on the response, or `None` when
    /// the path is excluded from protection.
    ///
    /// A missing secret cookie is created through `jar`. Requests whose method
    /// isn't ignored must carry a token derived from the secret, otherwise this
    /// fails with [`Error::Validation`].
    pub async fn protect<J>(
        &self,
        request: &mut dyn CsrfRequest,
        jar: &J,
    ) -> Result<Option<String>, Error>
    where
        J: CookieJar + ?Sized,
    {
        let config = &self.config;

        if config.is_excluded(request.pathname()) {
            tracing::trace!(path = request.pathname(), "excluded from csrf protection");

            return Ok(None);
        }

        let secret = match jar.get_cookie(&config.cookie.name) {
            Some(value) => codec::decode(&value),
            None => {
                let secret = self
                    .codec
                    .create_secret(config.secret_byte_length.into());
                jar.set_cookie(build_cookie(&config.cookie, codec::encode(&secret)));
                tracing::trace!("created csrf secret");

                secret
            }
        };

        if !config.is_ignored(request.method()) {
            let token = lookup::token_string(request, &config.token).await?;

            if !self.codec.verify_token(&codec::decode(&token), &secret) {
                tracing::debug!(
                    method = request.method(),
                    path = request.pathname(),
                    "csrf token rejected"
                );

                return Err(Error::Validation);
            }
        }

        let token = self.codec.create_token(&secret, config.salt_byte_length);

        Ok(Some(codec::encode(&token)))
    }
}
