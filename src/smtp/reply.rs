//! Parsing of (possibly multi-line) SMTP server replies.

use super::SmtpError;
use std::fmt;

/// A complete server reply: a three-digit status code and the text of every
/// line that made up the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    /// Returns `true` if `line` ends a reply.
    ///
    /// A `-` in the fourth column marks a continuation line; anything else
    /// (a space, or a bare three-digit code) ends the reply.
    pub fn is_final_line(line: &str) -> bool {
        line.as_bytes().get(3) != Some(&b'-')
    }

    /// Builds a reply from its raw lines (without line terminators). The
    /// status code is taken from the first three characters of the first line.
    pub fn parse(raw_lines: &[String]) -> Result<Self, SmtpError> {
        let first = raw_lines
            .first()
            .ok_or_else(|| SmtpError::MalformedReply(String::new()))?;

        let code = first
            .get(..3)
            .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u16>().ok())
            .ok_or_else(|| SmtpError::MalformedReply(first.clone()))?;

        let lines = raw_lines
            .iter()
            .map(|line| line.get(4..).unwrap_or_default().to_string())
            .collect();

        Ok(Self { code, lines })
    }

    /// 2xx: the requested action completed.
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// The reply text with the lines joined by a single space.
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text())
    }
}
