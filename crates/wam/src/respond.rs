//! Serializes the response view onto the wire once the chain has finished.

use crate::body::Body;
use crate::context::Context;
use crate::handler::Finalize;
use crate::response::Response;
use crate::status;
use http::Method;
use tracing::trace;

const STYLE: &str = "<style>\
body{font-family:sans-serif;text-align:center;padding:80px 20px 0;margin:0;font-size:16px;background:#000;}\
h1{font-weight:bold;font-size:8em;color:#FFF;margin:0;}\
p{font-family:'AndaleMono',monospace;color:#1ff042;font-size:0.9em;line-height:200%;letter-spacing:0.15em;}\
</style>";

/// Finishes the response the way the chain asked for.
pub fn respond(ctx: &mut Context, mode: Finalize) {
    match mode {
        Finalize::AlreadyFullyHandled => {}
        Finalize::SkipDefaultResponder => ctx.response_mut().end(()),
        Finalize::RunDefaultResponder => {
            let head = ctx.method() == Method::HEAD;
            write(ctx.response_mut(), head);
        }
    }
}

fn write(response: &mut Response, head: bool) {
    if !response.writable() {
        trace!(status = %response.status(), "response not writable, nothing to send");
        return;
    }

    if status::is_empty_body(response.status()) {
        response.take_body();
        response.end(());
        return;
    }

    if head {
        if let Some(Body::Json(value)) = response.body() {
            let length = value.to_string().len() as u64;
            response.set_length(length);
        }
        response.end(());
        return;
    }

    match response.take_body() {
        None => {
            let code = response.status().as_u16();
            let message = match response.message() {
                "" => code.to_string(),
                message => escape(message),
            };
            let page = status_page(&format!("{code} - {message}"), code, &message);

            response.set_mime_type("html");
            response.set_length(page.len() as u64);
            response.end(page);
        }
        Some(Body::Json(value)) => {
            let text = value.to_string();
            response.set_length(text.len() as u64);
            response.end(text);
        }
        Some(body) => response.end(body),
    }
}

fn status_page(title: &str, code: u16, message: &str) -> String {
    format!(
        "<!doctype html><meta name=\"viewport\" content=\"width=device-width\">\
         <title>{title}</title><div><h1>{code}</h1><p>{message}</p></div>{STYLE}"
    )
}

pub(crate) fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}
