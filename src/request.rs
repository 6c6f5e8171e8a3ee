use std::borrow::Cow;

use async_trait::async_trait;
use bytes::Bytes;
use http::request::Parts;
use http_body::Body;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tower_cookies::{Cookie, Cookies};

use crate::{
    config::{CookieOptions, DEFAULT_BODY_LIMIT},
    error::BoxError,
    Error,
};

/// What the protection needs to know about an incoming request.
///
/// Hosts implement this over their own request type; [`HttpRequest`] covers
/// anything built on [`http::Request`].
#[async_trait]
pub trait CsrfRequest: Send {
    fn method(&self) -> &str;

    /// Looks up a header by case-insensitive name. Values that aren't valid
    /// UTF-8 are decoded lossily rather than hidden.
    fn header(&self, name: &str) -> Option<Cow<'_, str>>;

    fn pathname(&self) -> &str;

    /// The full request body. May be called more than once.
    async fn body(&mut self) -> Result<Bytes, Error>;
}

/// Read and write access to the cookie holding the session secret.
pub trait CookieJar {
    fn get_cookie(&self, name: &str) -> Option<String>;

    fn set_cookie(&self, cookie: Cookie<'static>);
}

/// Replaces the built-in token lookup.
///
/// ```rust
/// use std::borrow::Cow;
///
/// use async_trait::async_trait;
/// use tower_csrf::{CsrfRequest, Error, TokenValue};
///
/// struct QueryParam;
///
/// #[async_trait]
/// impl TokenValue for QueryParam {
///     async fn token_value(&self, request: &mut dyn CsrfRequest) -> Result<String, Error> {
///         Ok(request
///             .header("x-custom-token")
///             .map(|value| value.into_owned())
///             .unwrap_or_default())
///     }
/// }
/// ```
#[async_trait]
pub trait TokenValue: Send + Sync {
    async fn token_value(&self, request: &mut dyn CsrfRequest) -> Result<String, Error>;
}

impl CookieJar for Cookies {
    fn get_cookie(&self, name: &str) -> Option<String> {
        self.get(name).map(|cookie| cookie.value().to_owned())
    }

    fn set_cookie(&self, cookie: Cookie<'static>) {
        self.add(cookie);
    }
}

pub(crate) fn build_cookie(options: &CookieOptions, value: String) -> Cookie<'static> {
    let mut builder = Cookie::build((options.name.clone(), value))
        .path(options.path.clone())
        .http_only(options.http_only)
        .same_site(options.same_site)
        .secure(options.secure);

    if let Some(domain) = &options.domain {
        builder = builder.domain(domain.clone());
    }

    if let Some(max_age) = options.max_age {
        builder = builder.max_age(max_age);
    }

    if let Some(partitioned) = options.partitioned {
        builder = builder.partitioned(partitioned);
    }

    builder.build()
}

/// [`CsrfRequest`] over the parts and body of an [`http::Request`].
///
/// The body is only collected when something asks for it, so requests that
/// carry their token in a header pass through without being buffered.
/// Collection stops with [`Error::BodyTooLarge`] past the limit, 2 MiB unless
/// set with [`HttpRequest::with_limit`].
pub struct HttpRequest<B> {
    parts: Parts,
    body: BodyState<B>,
    limit: usize,
}

enum BodyState<B> {
    Streaming(B),
    Buffered(Bytes),
    Taken,
}

impl<B> HttpRequest<B> {
    pub fn new(request: http::Request<B>) -> Self {
        let (parts, body) = request.into_parts();

        Self {
            parts,
            body: BodyState::Streaming(body),
            limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;

        self
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    /// Gives the request back, with either the untouched body or the bytes
    /// that were read from it.
    pub fn into_parts(self) -> (Parts, Result<B, Bytes>) {
        let body = match self.body {
            BodyState::Streaming(body) => Ok(body),
            BodyState::Buffered(bytes) => Err(bytes),
            BodyState::Taken => Err(Bytes::new()),
        };

        (self.parts, body)
    }
}

#[async_trait]
impl<B> CsrfRequest for HttpRequest<B>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    fn method(&self) -> &str {
        self.parts.method.as_str()
    }

    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.parts
            .headers
            .get(name)
            .map(|value| String::from_utf8_lossy(value.as_bytes()))
    }

    fn pathname(&self) -> &str {
        self.parts.uri.path()
    }

    async fn body(&mut self) -> Result<Bytes, Error> {
        match std::mem::replace(&mut self.body, BodyState::Taken) {
            BodyState::Streaming(body) => {
                let limit = self.limit;
                let bytes = Limited::new(body, limit)
                    .collect()
                    .await
                    .map_err(|err| {
                        if err.is::<LengthLimitError>() {
                            Error::BodyTooLarge(limit)
                        } else {
                            Error::Body(err)
                        }
                    })?
                    .to_bytes();
                self.body = BodyState::Buffered(bytes.clone());

                Ok(bytes)
            }
            BodyState::Buffered(bytes) => {
                self.body = BodyState::Buffered(bytes.clone());

                Ok(bytes)
            }
            BodyState::Taken => Ok(Bytes::new()),
        }
    }
}
