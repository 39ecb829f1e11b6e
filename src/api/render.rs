//! Response rendering: HTML pages by default, JSON on request.

use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

use crate::error::ImportError;
use crate::types::ImportSummary;

/// Representation the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    Json,
}

impl Format {
    /// JSON when the `Accept` header mentions `application/json`, otherwise HTML.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let wants_json = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("application/json"));
        if wants_json {
            Format::Json
        } else {
            Format::Html
        }
    }
}

/// Confirmation for a successful import.
pub fn success(format: Format, summary: &ImportSummary) -> Response {
    let message = summary.message();
    match format {
        Format::Json => Json(json!({
            "status": "ok",
            "message": message,
            "summary": summary,
        }))
        .into_response(),
        Format::Html => Html(page("Import complete", &message)).into_response(),
    }
}

/// Error status with a human-readable message.
pub fn failure(format: Format, error: &ImportError) -> Response {
    let status = error.status_code();
    debug!(status = status.as_u16(), kind = error.kind(), "Rendering failure");
    match format {
        Format::Json => (
            status,
            Json(json!({
                "status": "error",
                "error": error.kind(),
                "message": error.to_string(),
            })),
        )
            .into_response(),
        Format::Html => (status, Html(page("Import failed", &error.to_string()))).into_response(),
    }
}

/// The submission form served on `GET /import`.
pub fn form_page() -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>Import</title></head>\
         <body><h1>Import into the graph</h1>\
         <form method=\"post\" action=\"/import\">\
         <p><label>URL or text<br><textarea name=\"target\" rows=\"6\" cols=\"80\" required></textarea></label></p>\
         <p><label>Tenant <input name=\"tenant_id\"></label></p>\
         <p><button type=\"submit\">Import</button></p>\
         </form><p><small>v{}</small></p></body></html>",
        env!("CARGO_PKG_VERSION")
    ))
}

fn page(title: &str, message: &str) -> String {
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{message}</p><p><a href=\"/import\">Import another</a></p></body></html>",
        title = escape_html(title),
        message = escape_html(message),
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    #[test]
    fn test_format_negotiation() {
        let mut headers = HeaderMap::new();
        assert_eq!(Format::from_headers(&headers), Format::Html);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert_eq!(Format::from_headers(&headers), Format::Json);
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html,*/*"));
        assert_eq!(Format::from_headers(&headers), Format::Html);
    }

    #[test]
    fn test_failure_status_and_escaping() {
        let error = ImportError::Validation("<script>".to_string());
        let response = failure(Format::Html, &error);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(escape_html("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
