use std::convert::Infallible;

use bytes::Bytes;
use futures_util::stream;
use serde_json::Value;

use crate::{config::TokenOptions, request::CsrfRequest, Error};

enum BodyKind {
    Form,
    Multipart,
    Json,
    Text,
}

fn body_kind(content_type: &str) -> BodyKind {
    let Ok(mime) = content_type.parse::<mime::Mime>() else {
        return BodyKind::Text;
    };

    let (type_, subtype) = (mime.type_(), mime.subtype());

    if type_ == mime::APPLICATION && subtype == mime::WWW_FORM_URLENCODED {
        BodyKind::Form
    } else if type_ == mime::MULTIPART && subtype == mime::FORM_DATA {
        BodyKind::Multipart
    } else if type_ == mime::APPLICATION
        && (subtype == mime::JSON || (subtype == "ld" && mime.suffix() == Some(mime::JSON)))
    {
        BodyKind::Json
    } else {
        BodyKind::Text
    }
}

/// Finds the token the client submitted with `request`.
///
/// In order: the configured override, the token request header, then the body
/// according to its content type. Nothing found, or a body that doesn't parse,
/// gives an empty string. Only failing to read the body is an error.
pub async fn token_string(
    request: &mut dyn CsrfRequest,
    options: &TokenOptions,
) -> Result<String, Error> {
    if let Some(value) = &options.value {
        return value.token_value(request).await;
    }

    if let Some(token) = request.header(options.request_header.as_str()) {
        return Ok(token.into_owned());
    }

    let content_type = request
        .header(http::header::CONTENT_TYPE.as_str())
        .map_or_else(|| "text/plain".to_owned(), |value| value.into_owned());

    let body = request.body().await?;

    let token = match body_kind(&content_type) {
        BodyKind::Form => from_form(&body, options),
        BodyKind::Multipart => from_multipart(&content_type, body, options).await,
        BodyKind::Json => from_json(&body, options),
        BodyKind::Text => from_text(&body, options),
    };

    Ok(token)
}

fn from_form(body: &[u8], options: &TokenOptions) -> String {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .ok()
        .and_then(|fields| {
            fields
                .into_iter()
                .find(|(name, _)| options.matches_field(name))
        })
        .map(|(_, value)| value)
        .unwrap_or_default()
}

async fn from_multipart(content_type: &str, body: Bytes, options: &TokenOptions) -> String {
    let Ok(boundary) = multer::parse_boundary(content_type) else {
        return String::new();
    };

    let stream = stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    while let Ok(Some(field)) = multipart.next_field().await {
        if !field.name().is_some_and(|name| options.matches_field(name)) {
            continue;
        }

        if field.file_name().is_some() {
            return String::new();
        }

        return field.text().await.unwrap_or_default();
    }

    String::new()
}

fn from_json(body: &[u8], options: &TokenOptions) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => match map.get(&options.field_name) {
            Some(Value::String(token)) => token.clone(),
            _ => String::new(),
        },
        _ => String::new(),
    }
}

/// Raw text, or the first positional argument when the body is a JSON array
/// of server action arguments.
fn from_text(body: &[u8], options: &TokenOptions) -> String {
    let raw = String::from_utf8_lossy(body).into_owned();

    let Ok(Value::Array(args)) = serde_json::from_str::<Value>(&raw) else {
        return raw;
    };

    match args.into_iter().next() {
        None | Some(Value::Null) => raw,
        Some(Value::String(token)) => token,
        Some(Value::Object(map)) => match map.get(&options.field_name) {
            Some(Value::String(token)) => token.clone(),
            _ => String::new(),
        },
        Some(Value::Array(_)) => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use async_trait::async_trait;
    use http::HeaderMap;

    use super::*;
    use crate::{Config, TokenValue};

    struct TestRequest {
        headers: HeaderMap,
        body: Bytes,
        body_reads: usize,
    }

    impl TestRequest {
        fn new(content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
            let mut headers = HeaderMap::new();
            if let Some(content_type) = content_type {
                headers.insert("content-type", content_type.parse().unwrap());
            }

            Self {
                headers,
                body: body.into(),
                body_reads: 0,
            }
        }

        fn with_header(mut self, name: &'static str, value: &str) -> Self {
            self.headers.insert(name, value.parse().unwrap());

            self
        }
    }

    #[async_trait]
    impl CsrfRequest for TestRequest {
        fn method(&self) -> &str {
            "POST"
        }

        fn header(&self, name: &str) -> Option<Cow<'_, str>> {
            self.headers
                .get(name)
                .map(|v| String::from_utf8_lossy(v.as_bytes()))
        }

        fn pathname(&self) -> &str {
            "/"
        }

        async fn body(&mut self) -> Result<Bytes, Error> {
            self.body_reads += 1;

            Ok(self.body.clone())
        }
    }

    async fn lookup(request: &mut TestRequest) -> String {
        let config = Config::builder().build().unwrap();

        token_string(request, config.token()).await.unwrap()
    }

    #[tokio::test]
    async fn header_wins_over_body() {
        let mut request = TestRequest::new(
            Some("application/x-www-form-urlencoded"),
            "csrf_token=from-body",
        )
        .with_header("x-csrf-token", "my-token");

        assert_eq!(lookup(&mut request).await, "my-token");
        assert_eq!(request.body_reads, 0);
    }

    #[tokio::test]
    async fn opaque_header_still_wins_over_body() {
        let mut request = TestRequest::new(
            Some("application/x-www-form-urlencoded"),
            "csrf_token=from-body",
        );
        request.headers.insert(
            "x-csrf-token",
            http::HeaderValue::from_bytes(b"tok\xffen").unwrap(),
        );

        assert_eq!(lookup(&mut request).await, "tok\u{fffd}en");
        assert_eq!(request.body_reads, 0);
    }

    #[tokio::test]
    async fn empty_header_is_returned() {
        let mut request = TestRequest::new(Some("application/json"), r#"{"csrf_token":"x"}"#)
            .with_header("x-csrf-token", "");

        assert_eq!(lookup(&mut request).await, "");
    }

    #[tokio::test]
    async fn configured_request_header() {
        let config = Config::builder()
            .request_header("x-xsrf-token")
            .build()
            .unwrap();
        let mut request = TestRequest::new(None, "").with_header("x-xsrf-token", "my-token");

        assert_eq!(
            token_string(&mut request, config.token()).await.unwrap(),
            "my-token"
        );
    }

    #[tokio::test]
    async fn override_bypasses_lookup() {
        struct Fixed;

        #[async_trait]
        impl TokenValue for Fixed {
            async fn token_value(&self, _: &mut dyn CsrfRequest) -> Result<String, Error> {
                Ok("overridden".into())
            }
        }

        let config = Config::builder().value(Fixed).build().unwrap();
        let mut request = TestRequest::new(None, "").with_header("x-csrf-token", "my-token");

        assert_eq!(
            token_string(&mut request, config.token()).await.unwrap(),
            "overridden"
        );
    }

    #[tokio::test]
    async fn urlencoded_form() {
        let mut request = TestRequest::new(
            Some("application/x-www-form-urlencoded"),
            "a=1&csrf_token=my-token",
        );
        assert_eq!(lookup(&mut request).await, "my-token");

        let mut request = TestRequest::new(
            Some("application/x-www-form-urlencoded; charset=UTF-8"),
            "a=1&csrf_token=my%2Btoken%3D",
        );
        assert_eq!(lookup(&mut request).await, "my+token=");

        let mut request =
            TestRequest::new(Some("application/x-www-form-urlencoded"), "a=1&b=2");
        assert_eq!(lookup(&mut request).await, "");
    }

    #[tokio::test]
    async fn numbered_form_field() {
        let mut request = TestRequest::new(
            Some("application/x-www-form-urlencoded"),
            "1_a=1&2_csrf_token=my-token",
        );

        assert_eq!(lookup(&mut request).await, "my-token");
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> String {
        let mut body = String::new();
        for (name, file_name, value) in parts {
            body.push_str("--BOUNDARY\r\n");
            match file_name {
                Some(file_name) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                     Content-Type: text/plain\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str("--BOUNDARY--\r\n");

        body
    }

    #[tokio::test]
    async fn multipart_form() {
        let body = multipart_body(&[
            ("upload", Some("notes.txt"), "file contents"),
            ("csrf_token", None, "my-token"),
        ]);
        let mut request =
            TestRequest::new(Some("multipart/form-data; boundary=BOUNDARY"), body);

        assert_eq!(lookup(&mut request).await, "my-token");
    }

    #[tokio::test]
    async fn multipart_file_named_like_token() {
        let body = multipart_body(&[
            ("csrf_token", Some("token.txt"), "my-token"),
            ("1_csrf_token", None, "later"),
        ]);
        let mut request =
            TestRequest::new(Some("multipart/form-data; boundary=BOUNDARY"), body);

        assert_eq!(lookup(&mut request).await, "");
    }

    #[tokio::test]
    async fn malformed_multipart() {
        let mut request = TestRequest::new(Some("multipart/form-data"), "garbage");
        assert_eq!(lookup(&mut request).await, "");

        let mut request =
            TestRequest::new(Some("multipart/form-data; boundary=BOUNDARY"), "garbage");
        assert_eq!(lookup(&mut request).await, "");
    }

    #[tokio::test]
    async fn json_body() {
        let mut request = TestRequest::new(Some("application/json"), r#"{"csrf_token":"my-token"}"#);
        assert_eq!(lookup(&mut request).await, "my-token");

        let mut request =
            TestRequest::new(Some("application/ld+json"), r#"{"csrf_token":"my-token"}"#);
        assert_eq!(lookup(&mut request).await, "my-token");

        let mut request = TestRequest::new(Some("application/json"), r#"{"csrf_token":5}"#);
        assert_eq!(lookup(&mut request).await, "");

        let mut request = TestRequest::new(Some("application/json"), "{not json");
        assert_eq!(lookup(&mut request).await, "");

        let mut request = TestRequest::new(Some("application/json"), r#"["my-token"]"#);
        assert_eq!(lookup(&mut request).await, "");
    }

    #[tokio::test]
    async fn server_action_arguments() {
        let cases = [
            (r#"["my-token","arg"]"#, "my-token"),
            (r#"[{"csrf_token":"my-token"},"arg"]"#, "my-token"),
            (r#"[{"other":"x"}]"#, ""),
            (r#"[["nested"]]"#, ""),
            ("[42]", "42"),
            ("[true]", "true"),
            ("[null]", "[null]"),
            ("[]", "[]"),
            (r#"{"csrf_token":"my-token"}"#, r#"{"csrf_token":"my-token"}"#),
            ("my-token", "my-token"),
        ];

        for (body, expected) in cases {
            let mut request = TestRequest::new(Some("text/plain;charset=UTF-8"), body);
            assert_eq!(lookup(&mut request).await, expected, "body: {body}");
        }
    }

    #[tokio::test]
    async fn missing_or_unknown_content_type_is_text() {
        let mut request = TestRequest::new(None, r#"["my-token"]"#);
        assert_eq!(lookup(&mut request).await, "my-token");

        let mut request = TestRequest::new(Some("application/octet-stream"), "my-token");
        assert_eq!(lookup(&mut request).await, "my-token");

        let mut request = TestRequest::new(Some("not a mime type"), "my-token");
        assert_eq!(lookup(&mut request).await, "my-token");
    }

    #[tokio::test]
    async fn configured_field_name() {
        let config = Config::builder().field_name("_token").build().unwrap();

        let mut request = TestRequest::new(Some("application/json"), r#"{"_token":"my-token"}"#);
        assert_eq!(
            token_string(&mut request, config.token()).await.unwrap(),
            "my-token"
        );

        let mut request = TestRequest::new(
            Some("application/x-www-form-urlencoded"),
            "csrf_token=wrong&3__token=my-token",
        );
        assert_eq!(
            token_string(&mut request, config.token()).await.unwrap(),
            "my-token"
        );
    }
}
