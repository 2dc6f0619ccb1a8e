//! Status code tables: the messages shown for each code and the code groups the pipeline cares about.

use http::StatusCode;
use std::borrow::Cow;
use std::collections::HashMap;

const DEFAULT_MESSAGES: &[(u16, &str)] = &[
    (200, "OK"),
    (300, "Multiple Choices"),
    (301, "Moved Permanently"),
    (302, "Found"),
    (304, "Not Modified"),
    (307, "Temporary Redirect"),
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (410, "Gone"),
    (500, "Internal Server Error"),
    (501, "Not Implemented"),
    (503, "Service Unavailable"),
    (550, "Permission denied"),
];

/// Application level table of status messages.
///
/// A status code is "recognized" when the table has a message for it; errors asking for an
/// unrecognized status are answered with 500.
#[derive(Debug, Clone)]
pub struct StatusMessages {
    messages: HashMap<u16, Cow<'static, str>>,
}

impl Default for StatusMessages {
    fn default() -> Self {
        let messages = DEFAULT_MESSAGES.iter().map(|&(code, message)| (code, Cow::Borrowed(message))).collect();
        Self { messages }
    }
}

impl StatusMessages {
    pub fn message(&self, status: StatusCode) -> Option<&str> {
        self.messages.get(&status.as_u16()).map(AsRef::as_ref)
    }

    pub fn contains(&self, status: StatusCode) -> bool {
        self.messages.contains_key(&status.as_u16())
    }

    pub fn insert(&mut self, status: StatusCode, message: impl Into<Cow<'static, str>>) {
        self.messages.insert(status.as_u16(), message.into());
    }
}

/// Statuses whose responses never carry a body.
pub fn is_empty_body(status: StatusCode) -> bool {
    matches!(status.as_u16(), 204 | 205 | 304)
}

pub fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 300 | 301 | 302 | 303 | 305 | 307 | 308)
}

/// Statuses after which a client may retry the request.
pub fn is_retry(status: StatusCode) -> bool {
    matches!(status.as_u16(), 502..=504)
}
