use std::{fmt, sync::Arc};

use http::{HeaderName, Method};
use regex::Regex;
use tower_cookies::cookie::{time::Duration, SameSite};

use crate::{request::TokenValue, Error};

/// Attributes of the cookie holding the session secret.
#[derive(Clone, Debug, PartialEq)]
pub struct CookieOptions {
    pub name: String,
    pub domain: Option<String>,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    /// `None` makes it a session cookie.
    pub max_age: Option<Duration>,
    pub partitioned: Option<bool>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: "_csrfSecret".into(),
            domain: None,
            path: "/".into(),
            http_only: true,
            secure: true,
            same_site: SameSite::Strict,
            max_age: None,
            partitioned: None,
        }
    }
}

/// Where tokens are looked for on requests and published on responses.
#[derive(Clone)]
pub struct TokenOptions {
    pub(crate) field_name: String,
    pub(crate) field_name_regex: Regex,
    pub(crate) request_header: HeaderName,
    pub(crate) response_header: HeaderName,
    pub(crate) value: Option<Arc<dyn TokenValue>>,
}

impl TokenOptions {
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn request_header(&self) -> &HeaderName {
        &self.request_header
    }

    pub fn response_header(&self) -> &HeaderName {
        &self.response_header
    }

    /// Whether a form field name refers to the token, allowing any number of
    /// `<digits>_` prefixes added by server action argument numbering.
    pub(crate) fn matches_field(&self, name: &str) -> bool {
        self.field_name_regex.is_match(name)
    }
}

impl fmt::Debug for TokenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenOptions")
            .field("field_name", &self.field_name)
            .field("request_header", &self.request_header)
            .field("response_header", &self.response_header)
            .field("value", &self.value.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Same default as axum's `DefaultBodyLimit`.
pub(crate) const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Validated, immutable CSRF settings. Build one with [`Config::builder`].
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) cookie: CookieOptions,
    pub(crate) salt_byte_length: u8,
    pub(crate) secret_byte_length: u8,
    pub(crate) ignore_methods: Vec<Method>,
    pub(crate) exclude_path_prefixes: Vec<String>,
    pub(crate) token: TokenOptions,
    pub(crate) body_limit: usize,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn cookie(&self) -> &CookieOptions {
        &self.cookie
    }

    pub fn token(&self) -> &TokenOptions {
        &self.token
    }

    pub fn salt_byte_length(&self) -> u8 {
        self.salt_byte_length
    }

    pub fn secret_byte_length(&self) -> u8 {
        self.secret_byte_length
    }

    pub fn ignore_methods(&self) -> &[Method] {
        &self.ignore_methods
    }

    pub fn exclude_path_prefixes(&self) -> &[String] {
        &self.exclude_path_prefixes
    }

    /// Most bytes of request body read while looking for a token.
    pub fn body_limit(&self) -> usize {
        self.body_limit
    }

    pub(crate) fn is_excluded(&self, path: &str) -> bool {
        self.exclude_path_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub(crate) fn is_ignored(&self, method: &str) -> bool {
        self.ignore_methods.iter().any(|m| m.as_str() == method)
    }
}

fn field_name_regex(field_name: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"^(\d+_)*{}$", regex::escape(field_name)))
}

/// Layered builder for [`Config`].
///
/// Hosts that want different defaults (say, excluding a static asset prefix)
/// start from [`ConfigBuilder::with_defaults`] and let users override on top.
#[derive(Clone)]
pub struct ConfigBuilder {
    cookie: CookieOptions,
    salt_byte_length: usize,
    secret_byte_length: usize,
    ignore_methods: Vec<Method>,
    exclude_path_prefixes: Vec<String>,
    field_name: String,
    request_header: String,
    response_header: String,
    value: Option<Arc<dyn TokenValue>>,
    body_limit: usize,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            cookie: CookieOptions::default(),
            salt_byte_length: 8,
            secret_byte_length: 18,
            ignore_methods: vec![Method::GET, Method::HEAD, Method::OPTIONS],
            exclude_path_prefixes: Vec::new(),
            field_name: "csrf_token".into(),
            request_header: "x-csrf-token".into(),
            response_header: "X-CSRF-Token".into(),
            value: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_defaults(defaults: Config) -> Self {
        Self {
            cookie: defaults.cookie,
            salt_byte_length: defaults.salt_byte_length.into(),
            secret_byte_length: defaults.secret_byte_length.into(),
            ignore_methods: defaults.ignore_methods,
            exclude_path_prefixes: defaults.exclude_path_prefixes,
            field_name: defaults.token.field_name,
            request_header: defaults.token.request_header.to_string(),
            response_header: defaults.token.response_header.to_string(),
            value: defaults.token.value,
            body_limit: defaults.body_limit,
        }
    }

    pub fn cookie(mut self, cookie: CookieOptions) -> Self {
        self.cookie = cookie;

        self
    }

    pub fn cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie.name = cookie_name.into();

        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie.domain = Some(domain.into());

        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.cookie.path = path.into();

        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.cookie.http_only = http_only;

        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.cookie.secure = secure;

        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.cookie.same_site = same_site;

        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.cookie.max_age = Some(max_age);

        self
    }

    pub fn partitioned(mut self, partitioned: bool) -> Self {
        self.cookie.partitioned = Some(partitioned);

        self
    }

    pub fn salt_byte_length(mut self, salt_byte_length: usize) -> Self {
        self.salt_byte_length = salt_byte_length;

        self
    }

    pub fn secret_byte_length(mut self, secret_byte_length: usize) -> Self {
        self.secret_byte_length = secret_byte_length;

        self
    }

    pub fn ignore_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.ignore_methods = methods.into_iter().collect();

        self
    }

    pub fn exclude_path_prefixes<I, P>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.exclude_path_prefixes = prefixes.into_iter().map(Into::into).collect();

        self
    }

    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();

        self
    }

    pub fn request_header(mut self, header_name: impl Into<String>) -> Self {
        self.request_header = header_name.into();

        self
    }

    pub fn response_header(mut self, header_name: impl Into<String>) -> Self {
        self.response_header = header_name.into();

        self
    }

    /// Replaces all built-in token lookup with `value`.
    pub fn value(mut self, value: impl TokenValue + 'static) -> Self {
        self.value = Some(Arc::new(value));

        self
    }

    /// Caps how much of a request body is buffered to find a token. Larger
    /// bodies are rejected with `413 Payload Too Large`.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;

        self
    }

    pub fn build(self) -> Result<Config, Error> {
        let salt_byte_length = u8::try_from(self.salt_byte_length)
            .ok()
            .filter(|len| *len >= 1)
            .ok_or(Error::SaltByteLength(self.salt_byte_length))?;

        let secret_byte_length = u8::try_from(self.secret_byte_length)
            .ok()
            .filter(|len| *len >= 1)
            .ok_or(Error::SecretByteLength(self.secret_byte_length))?;

        let field_name_regex = field_name_regex(&self.field_name)?;
        let request_header = HeaderName::try_from(self.request_header)?;
        let response_header = HeaderName::try_from(self.response_header)?;

        Ok(Config {
            cookie: self.cookie,
            salt_byte_length,
            secret_byte_length,
            ignore_methods: self.ignore_methods,
            exclude_path_prefixes: self.exclude_path_prefixes,
            token: TokenOptions {
                field_name: self.field_name,
                field_name_regex,
                request_header,
                response_header,
                value: self.value,
            },
            body_limit: self.body_limit,
        })
    }
}
