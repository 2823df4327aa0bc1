use std::collections::BTreeMap;
use std::fmt::Write as _;

use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Serialize;

use crate::{
    error::{AppError, ErrorReport},
    middleware_layer::session::SessionHandle,
    negotiate::ContentType,
};

/// An HTML page ready for the layout.
pub struct Page {
    pub status: StatusCode,
    pub title: String,
    /// Pre-escaped markup.
    pub body: String,
}

impl Page {
    pub fn new(title: impl Into<String>, body: String) -> Self {
        Self {
            status: StatusCode::OK,
            title: title.into(),
            body,
        }
    }
}

/// Writes responses in either representation.
///
/// Every HTML render consumes the pending flash messages, so a message set
/// before a redirect shows up on the page the redirect lands on and nowhere
/// after it.
#[derive(Clone, Debug)]
pub struct Renderer {
    is_production: bool,
}

impl Renderer {
    pub fn new(is_production: bool) -> Self {
        Self { is_production }
    }

    pub async fn html(&self, session: &SessionHandle, page: Page) -> Response {
        let flash = session.pop_flash().await;
        let user_name = session.data().await.user_name;
        let markup = layout(&page.title, user_name.as_deref(), &flash, &page.body);
        (page.status, Html(markup)).into_response()
    }

    pub fn json<T: Serialize>(&self, status: StatusCode, value: &T) -> Response {
        match sonic_rs::to_string(value) {
            Ok(body) => (status, [(header::CONTENT_TYPE, "application/json")], body).into_response(),
            Err(e) => AppError::Internal(format!("JSON serialization failed: {}", e)).into_response(),
        }
    }

    /// 303 See Other.
    pub fn redirect(&self, to: &str) -> Response {
        Redirect::to(to).into_response()
    }

    /// Renders an error in the negotiated representation, hiding internal
    /// detail in production.
    pub fn error(&self, content_type: ContentType, report: &ErrorReport) -> Response {
        let message = if self.is_production {
            report.public.as_str()
        } else {
            report.detail.as_str()
        };

        match content_type {
            ContentType::Json => self.json(report.status, &sonic_rs::json!({ "error": message })),
            ContentType::Html => {
                let title = report.status.canonical_reason().unwrap_or("Error");
                let body = format!(
                    "<h1>{}</h1>\n<p class=\"error-message\">{}</p>",
                    escape(title),
                    escape(message)
                );
                let markup = layout(title, None, &BTreeMap::new(), &body);
                (report.status, Html(markup)).into_response()
            }
        }
    }
}

fn layout(
    title: &str,
    user_name: Option<&str>,
    flash: &BTreeMap<String, Vec<String>>,
    body: &str,
) -> String {
    let mut out = String::with_capacity(body.len() + 512);
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", escape(title));
    out.push_str("<link rel=\"stylesheet\" href=\"/assets/app.css\">\n</head>\n<body>\n<nav>");
    out.push_str("<a href=\"/\">Home</a> <a href=\"/users\">Users</a>");
    match user_name {
        Some(name) => {
            let _ = write!(out, " <span>{}</span> <a href=\"/logout\">Log out</a>", escape(name));
        }
        None => out.push_str(" <a href=\"/auth\">Log in</a>"),
    }
    out.push_str("</nav>\n");

    for (category, messages) in flash {
        for message in messages {
            let _ = writeln!(
                out,
                "<div class=\"flash flash-{}\">{}</div>",
                escape(category),
                escape(message)
            );
        }
    }

    let _ = write!(out, "<main>\n{}\n</main>\n</body>\n</html>\n", body);
    out
}

/// Escapes text for HTML element and attribute content.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(
            escape(r#"<script>alert("x&y")</script>"#),
            "&lt;script&gt;alert(&quot;x&amp;y&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn layout_shows_each_flash_message() {
        let mut flash = BTreeMap::new();
        flash.insert("success".to_string(), vec!["User deleted".to_string()]);
        let html = layout("Users", Some("Joe"), &flash, "<p>hi</p>");

        assert!(html.contains("<div class=\"flash flash-success\">User deleted</div>"));
        assert!(html.contains("<span>Joe</span>"));
        assert!(html.contains("<p>hi</p>"));
    }

    #[test]
    fn production_errors_hide_detail() {
        let report = AppError::Internal("db password wrong".into()).report();

        let prod = Renderer::new(true).error(ContentType::Json, &report);
        assert_eq!(prod.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let dev = Renderer::new(false).error(ContentType::Html, &report);
        assert_eq!(dev.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            dev.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
    }
}
