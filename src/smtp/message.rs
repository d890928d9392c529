//! Framing of a plain-text message for the `DATA` phase.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, FixedOffset};
use std::borrow::Cow;
use std::fmt;

/// Bytes of UTF-8 text per RFC 2047 encoded word; keeps each word under the
/// 75 character limit once base64 and the `=?UTF-8?B?...?=` wrapper are added.
const ENCODED_WORD_CHUNK: usize = 45;

/// A mailbox with an optional display name, e.g. `"AgroPan Alerts" <noreply@agropan.com>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub name: Option<String>,
    pub address: String,
}

impl Mailbox {
    pub fn new(name: Option<&str>, address: &str) -> Self {
        Self {
            name: name
                .filter(|n| !n.trim().is_empty())
                .map(|n| single_line(n).into_owned()),
            address: single_line(address).into_owned(),
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            None => write!(f, "<{}>", self.address),
            Some(name) if !name.is_ascii() => {
                write!(f, "{} <{}>", encode_header_value(name), self.address)
            }
            Some(name) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{}\" <{}>", escaped, self.address)
            }
        }
    }
}

/// Header values for one outgoing message.
#[derive(Debug, Clone)]
pub struct Headers {
    pub from: Mailbox,
    pub reply_to: Option<String>,
    pub to: String,
    pub subject: String,
    pub date: DateTime<FixedOffset>,
}

/// Builds the full `DATA` payload: headers, a blank line and the dot-stuffed
/// body, every line CRLF-terminated. The lone `.` terminator is not included.
pub fn compose(headers: &Headers, body: &str) -> String {
    let mut message = String::with_capacity(body.len() + 512);
    push_header(&mut message, "From", &headers.from.to_string());
    if let Some(reply_to) = &headers.reply_to {
        push_header(&mut message, "Reply-To", &single_line(reply_to));
    }
    push_header(&mut message, "To", &single_line(&headers.to));
    let subject = single_line(&headers.subject);
    push_header(&mut message, "Subject", &encode_header_value(&subject));
    push_header(&mut message, "Date", &headers.date.to_rfc2822());
    push_header(&mut message, "MIME-Version", "1.0");
    push_header(&mut message, "Content-Type", "text/plain; charset=UTF-8");
    push_header(&mut message, "Content-Transfer-Encoding", "8bit");
    message.push_str("\r\n");
    message.push_str(&dot_stuff(body));
    message
}

/// Normalizes line endings to CRLF and doubles a leading `.` on every line,
/// so no body line can be read as the end-of-data marker.
pub fn dot_stuff(body: &str) -> String {
    let mut stuffed = String::with_capacity(body.len() + 16);
    for line in body.lines() {
        if line.starts_with('.') {
            stuffed.push('.');
        }
        stuffed.push_str(line);
        stuffed.push_str("\r\n");
    }
    stuffed
}

/// Encodes a header value as RFC 2047 `B` words when it is not plain ASCII.
pub fn encode_header_value(value: &str) -> Cow<'_, str> {
    if value.is_ascii() {
        return Cow::Borrowed(value);
    }

    let mut words = Vec::new();
    let mut start = 0;
    while start < value.len() {
        let mut end = (start + ENCODED_WORD_CHUNK).min(value.len());
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        words.push(format!(
            "=?UTF-8?B?{}?=",
            STANDARD.encode(&value.as_bytes()[start..end])
        ));
        start = end;
    }
    Cow::Owned(words.join("\r\n "))
}

fn push_header(message: &mut String, name: &str, value: &str) {
    message.push_str(name);
    message.push_str(": ");
    message.push_str(value);
    message.push_str("\r\n");
}

/// Replaces CR and LF with spaces; a line break inside a header value would
/// start a new header.
fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(['\r', '\n']) {
        Cow::Owned(value.replace(['\r', '\n'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
