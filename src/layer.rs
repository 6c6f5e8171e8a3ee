use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{HeaderValue, Request, Response};
use http_body::Body;
use http_body_util::{Either, Full};
use std::task::{Context, Poll};
use tower_cookies::{CookieManager, Cookies};
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    codec::Codec, error::BoxError, protect::CsrfProtect, request::HttpRequest, Config, Error,
    Token,
};

/// Request body handed to the inner service: the original body if the token
/// was found without reading it, otherwise the bytes that were read.
pub type CsrfBody<B> = Either<B, Full<Bytes>>;

/// Applies double-submit CSRF protection to a tower service.
///
/// Mutating requests without a token matching the secret cookie are answered
/// with `403 Forbidden` before reaching the inner service. Bodies read while
/// looking for the token are capped at [`Config::body_limit`]; larger ones get
/// `413 Payload Too Large`.
#[derive(Clone)]
pub struct CsrfLayer {
    protect: CsrfProtect,
}

impl CsrfLayer {
    pub fn new(config: Config) -> Self {
        Self {
            protect: CsrfProtect::new(config),
        }
    }

    pub fn with_codec(config: Config, codec: Codec) -> Self {
        Self {
            protect: CsrfProtect::with_codec(config, codec),
        }
    }
}

impl<S> Layer<S> for CsrfLayer {
    type Service = CookieManager<CsrfService<S>>;

    fn layer(&self, inner: S) -> Self::Service {
        CookieManager::new(CsrfService {
            protect: self.protect.clone(),
            inner,
        })
    }
}

#[derive(Clone)]
pub struct CsrfService<S> {
    protect: CsrfProtect,
    inner: S,
}

impl<S, B, R> Service<Request<B>> for CsrfService<S>
where
    S: Service<Request<CsrfBody<B>>, Response = Response<R>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
    R: Default + Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let cookies = match request
            .extensions()
            .get::<Cookies>()
            .cloned()
            .ok_or(Error::ExtensionNotFound("Cookies".into()))
        {
            Ok(cookies) => cookies,
            Err(err) => return Box::pin(async move { Error::make_layer_error(err) }),
        };

        let protect = self.protect.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut csrf_request =
                HttpRequest::new(request).with_limit(protect.config().body_limit());

            let token = match protect.protect(&mut csrf_request, &cookies).await {
                Ok(token) => token,
                Err(err @ (Error::Validation | Error::BodyTooLarge(_))) => {
                    return Error::make_layer_rejection(err.status())
                }
                Err(err) => return Error::make_layer_error(err),
            };

            let (mut parts, body) = csrf_request.into_parts();
            let body = match body {
                Ok(body) => Either::Left(body),
                Err(bytes) => Either::Right(Full::new(bytes)),
            };

            let header_value = match token.as_deref().map(HeaderValue::from_str).transpose() {
                Ok(value) => value,
                Err(err) => return Error::make_layer_error(err),
            };

            if let Some(token) = token {
                parts.extensions.insert(Token::new(token));
            }

            let mut response = inner.call(Request::from_parts(parts, body)).await?;

            if let Some(value) = header_value {
                let header_name = protect.config().token().response_header().clone();
                response.headers_mut().insert(header_name, value);
            }

            Ok(response)
        })
    }
}
