//! ## Overview
//!
//! This crate uses the [Double Submit Cookie Pattern][owasp-double-submit] to mitigate CSRF.
//!
//! ### How it works
//!
//! - **Secret**: every client gets a random **secret** (18 bytes by default, from the
//!   operating system CSPRNG), stored base64-encoded in a cookie. It never travels in
//!   any other channel.
//! - **Token creation**:
//!   - On every protected request we draw a fresh **salt** (8 bytes by default).
//!   - We hash the **secret** followed by the **salt** with SHA-1.
//!   - The token is `[0, salt length] ‖ salt ‖ hash`, sent base64-encoded in the
//!     `X-CSRF-Token` response header and available to handlers as [`Token`].
//! - **Token validation**:
//!   - Requests whose method isn't ignored (`GET`, `HEAD`, `OPTIONS` by default)
//!     must echo a token, either in the `x-csrf-token` header or in the body:
//!     a `csrf_token` form field (url-encoded or multipart, optionally with
//!     `<digits>_` prefixes), a `csrf_token` JSON property, or the first element of
//!     a JSON argument array sent as `text/plain`.
//!   - We re-hash the secret from the cookie with the salt from the token and
//!     compare in constant time. Tokens are never stored.
//!   - On mismatch the request is answered with `403 Forbidden`. A body read
//!     while looking for the token is capped at 2 MiB by default, and larger
//!     ones get `413 Payload Too Large`.
//!
//! ### Cookies
//!
//! By default the secret cookie is named `_csrfSecret`, and is `HttpOnly`,
//! `SameSite: Strict`, `Secure` and a session cookie.
//!
//! ## Usage
//!
//! ### With [`axum`][crate-axum]
//!
//! ```rust, no_run
//! use std::net::SocketAddr;
//!
//! use axum::{routing::{get, post}, Router};
//! use tower_csrf::{Config, CsrfLayer, Token};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::builder()
//!         .secure(false)
//!         .exclude_path_prefixes(["/static/"])
//!         .build()
//!         .unwrap();
//!
//!     let app = Router::new()
//!         .route("/", get(form))
//!         .route("/submit", post(|| async { "ok" }))
//!         .layer(CsrfLayer::new(config));
//!
//!     let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
//!     let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
//!
//!     axum::serve(listener, app.into_make_service())
//!         .await
//!         .unwrap();
//! }
//!
//! async fn form(token: Token) -> String {
//!     format!(r#"<form method="post" action="/submit"><input name="csrf_token" value="{}"></form>"#, token.get())
//! }
//! ```
//!
//! ### Other hosts
//!
//! [`CsrfProtect::protect`] only needs a [`CsrfRequest`] and a [`CookieJar`], so
//! hosts that aren't built on tower can implement those two traits themselves.
//!
//! [crate-axum]: https://github.com/tokio-rs/axum
//! [owasp-double-submit]: https://cheatsheetseries.owasp.org/cheatsheets/Cross-Site_Request_Forgery_Prevention_Cheat_Sheet.html#alternative-using-a-double-submit-cookie-pattern

pub use codec::{
    decode, encode, Codec, OsRandom, RandomSource, Sha1Digest, ThreadRandom, TokenDigest,
    DIGEST_LEN, MIN_TOKEN_LEN,
};
pub use config::{Config, ConfigBuilder, CookieOptions, TokenOptions};
pub use error::Error;
pub use layer::{CsrfBody, CsrfLayer, CsrfService};
pub use lookup::token_string;
pub use protect::CsrfProtect;
pub use request::{CookieJar, CsrfRequest, HttpRequest, TokenValue};
pub use token::Token;

mod codec;
mod config;
mod error;
mod layer;
mod lookup;
mod protect;
mod request;
mod token;
