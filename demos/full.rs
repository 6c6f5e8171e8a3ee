use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Router,
};
use http::StatusCode;
use maud::{html, Markup};
use tower_csrf::{Config, CsrfLayer, Token};

#[tokio::main]
async fn main() {
    let config = Config::builder()
        .secure(false)
        .exclude_path_prefixes(["/health"])
        .build()
        .unwrap();

    let app = Router::new()
        .route("/", get(root))
        .route("/submit", post(submit))
        .route("/health", post(|| async { StatusCode::OK }))
        .layer(CsrfLayer::new(config));

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}

async fn root(token: Token) -> Markup {
    let token = token.get();

    html! {
        link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/@picocss/pico@2/css/pico.min.css";
        script src="https://unpkg.com/htmx.org@2.0.2" {}

        main class="container" {
            p { mark { "Open the Network tab in your dev console." } }
            p { small { kbd { (token) } } }

            div class="grid" {
                div {
                    form hx-post="/submit" hx-swap="none" "hx-on::config-request"={"event.detail.headers['X-CSRF-Token'] = \"" (token) "\""} {
                        label for="hotdogs" { "How do you like your hotdogs?" }

                        select name="hotdogs" value="ketchup" {
                            option value="ketchup" { "Ketchup" }
                            option value="more-ketchup" { "More ketchup" }
                        }

                        button type="submit" { "Submit with header" }
                    }
                }

                div {
                    form method="post" action="/submit" {
                        input type="hidden" name="csrf_token" value=(token);

                        label for="hotdogs" { "How do you like your hotdogs?" }

                        select name="hotdogs" value="ketchup" {
                            option value="ketchup" { "Ketchup" }
                            option value="still-ketchup" { "Still ketchup" }
                        }

                        button type="submit" { "Submit with form field" }
                    }
                }

                div {
                    form hx-post="/submit" {
                        label for="hotdogs" { "How do you like your hotdogs?" }

                        select name="hotdogs" value="ketchup" {
                            option value="ketchup" { "Ketchup" }
                            option value="always-ketchup" { "It'll always be ketchup!" }
                        }

                        button type="submit" { "Submit without token" }
                    }
                }
            }
        }
    }
}

async fn submit() -> (StatusCode, &'static str) {
    (StatusCode::OK, "Success!")
}
