//! SMTP reply parsing and classification.
//!
//! Replies may span multiple lines (`250-FIRST` ... `250 LAST`); a reply is
//! complete once a line with a space separator after the status code has
//! been seen.

use crate::error::{ClientError, Result};

/// A complete (possibly multi-line) SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Three-digit status code.
    pub code: u16,
    /// Message text of each reply line, in order.
    pub lines: Vec<String>,
}

impl Reply {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// All reply lines joined with newlines.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    /// `true` for 2xx codes.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// `true` for 3xx codes (e.g. 354 after DATA).
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code >= 300 && self.code < 400
    }

    /// `true` for 4xx codes.
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code >= 400 && self.code < 500
    }

    /// `true` for 5xx codes.
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code >= 500 && self.code < 600
    }

    /// Whether the advertised EHLO capabilities include `keyword`.
    #[must_use]
    pub fn advertises(&self, keyword: &str) -> bool {
        self.lines
            .iter()
            .any(|line| line.to_ascii_uppercase().starts_with(&keyword.to_ascii_uppercase()))
    }

    /// Convert an error-class reply into a [`ClientError::Smtp`].
    #[must_use]
    pub fn into_error(self) -> ClientError {
        ClientError::Smtp {
            code: self.code,
            message: self.message(),
        }
    }

    /// Try to parse one complete reply from the front of `buf`.
    ///
    /// Returns `Ok(None)` when more data is needed, otherwise the reply and
    /// the number of bytes consumed.
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>> {
        let mut lines = Vec::new();
        let mut code = None;
        let mut consumed = 0;

        loop {
            let rest = &buf[consumed..];
            let Some(eol) = rest.iter().position(|&b| b == b'\n') else {
                return Ok(None);
            };

            let raw = &rest[..eol];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            consumed += eol + 1;

            let line = std::str::from_utf8(raw)
                .map_err(|e| ClientError::Parse(format!("reply is not valid UTF-8: {e}")))?;

            // `get` refuses short lines and a prefix that ends inside a
            // multi-byte character, so no indexing can panic here.
            let line_code: u16 = line
                .get(..3)
                .and_then(|prefix| prefix.parse().ok())
                .ok_or_else(|| ClientError::Parse(format!("invalid status code in {line:?}")))?;

            match code {
                None => code = Some(line_code),
                Some(c) if c != line_code => {
                    return Err(ClientError::Parse(format!(
                        "status code changed mid-reply: {c} then {line_code}"
                    )));
                }
                Some(_) => {}
            }

            let (last, text) = match line.as_bytes().get(3) {
                None => (true, ""),
                Some(b' ') => (true, &line[4..]),
                Some(b'-') => (false, &line[4..]),
                Some(&c) => {
                    return Err(ClientError::Parse(format!(
                        "invalid separator {:?} in {line:?}",
                        c as char
                    )));
                }
            };

            lines.push(text.to_string());

            if last {
                // code is always Some here
                let code = code.unwrap_or_default();
                return Ok(Some((Self::new(code, lines), consumed)));
            }
        }
    }
}
