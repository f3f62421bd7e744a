//! RFC 5322 message assembly.

use std::fmt::Write;

use chrono::Utc;
use courier_template::RenderedContent;
use ulid::Ulid;

/// Build the wire form of a message from rendered content.
///
/// Content with both text and HTML bodies becomes `multipart/alternative`
/// with the HTML part last (preferred per RFC 2046 §5.1.4); single-body
/// content is sent as plain `text/plain` or `text/html`.
#[must_use]
pub fn assemble(sender: &str, recipients: &[String], content: &RenderedContent) -> String {
    let mut message = String::new();

    let _ = write!(message, "Date: {}\r\n", Utc::now().to_rfc2822());
    let _ = write!(message, "From: <{sender}>\r\n");
    let to = recipients
        .iter()
        .map(|r| format!("<{r}>"))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = write!(message, "To: {to}\r\n");
    let _ = write!(message, "Subject: {}\r\n", sanitize_header(&content.subject));
    let _ = write!(message, "Message-ID: <{}@courier>\r\n", Ulid::new());
    message.push_str("MIME-Version: 1.0\r\n");

    match &content.html {
        Some(html) if content.text.is_empty() => {
            message.push_str("Content-Type: text/html; charset=utf-8\r\n\r\n");
            message.push_str(html);
        }
        Some(html) => {
            let boundary = format!("=_courier_{}", Ulid::new());
            let _ = write!(
                message,
                "Content-Type: multipart/alternative; boundary=\"{boundary}\"\r\n\r\n"
            );
            let _ = write!(
                message,
                "--{boundary}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
                content.text
            );
            let _ = write!(
                message,
                "--{boundary}\r\nContent-Type: text/html; charset=utf-8\r\n\r\n{html}\r\n"
            );
            let _ = write!(message, "--{boundary}--\r\n");
        }
        None => {
            message.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
            message.push_str(&content.text);
        }
    }

    message
}

/// Strip CR/LF so body text can never inject additional headers.
fn sanitize_header(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}
