//! Protocol pieces shared by the chat server and the terminal client.
//!
//! The wire protocol is plain UTF-8 text over TCP with no framing: whatever a
//! single socket read returns (at most [`READ_BUFFER_SIZE`] bytes) is one
//! message. Server-originated lines carry a `[Server]` or `[Server (private)]`
//! prefix, relayed chat carries `[username]`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4293;

/// Size of the per-connection read buffer, and therefore the largest message.
pub const READ_BUFFER_SIZE: usize = 64;

pub const BAN_LIMIT: Duration = Duration::from_secs(10 * 60);
pub const MESSAGE_RATE: Duration = Duration::from_secs(1);
pub const STRIKE_LIMIT: u32 = 10;
pub const MAX_USERNAME_LENGTH: usize = 32;
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

pub const SERVER_PREFIX: &str = "[Server]";
pub const PRIVATE_PREFIX: &str = "[Server (private)]";

/// Returns true if the payload may be treated as protocol content.
///
/// `text` is the decoded form of `bytes`. A payload is accepted when the bytes
/// are valid UTF-8, the text is not empty or whitespace-only, and it contains
/// no control characters other than tab, newline and carriage return.
pub fn is_valid_message(bytes: &[u8], text: &str) -> bool {
    std::str::from_utf8(bytes).is_ok()
        && !text.trim().is_empty()
        && !contains_control_chars(text)
}

/// C0 controls (except `\t`, `\n`, `\r`) and DEL.
pub fn contains_control_chars(text: &str) -> bool {
    text.chars().any(|c| {
        (c < '\u{20}' && c != '\t' && c != '\n' && c != '\r') || c == '\u{7f}'
    })
}

/// A newline-terminated system line: `[Server]text\n`.
pub fn server_line(text: &str) -> String {
    format!("{}{}\n", SERVER_PREFIX, text)
}

/// A system prompt without a trailing newline, so input follows on the same line.
pub fn server_prompt(text: &str) -> String {
    format!("{}{}", SERVER_PREFIX, text)
}

/// A private admin message: `[Server (private)]text\n`.
pub fn private_line(text: &str) -> String {
    format!("{}{}\n", PRIVATE_PREFIX, text)
}

/// Relayed chat. The text is forwarded as received, including any newline.
pub fn chat_line(username: &str, text: &str) -> String {
    format!("[{}]{}", username, text)
}

static SAFE_MODE: AtomicBool = AtomicBool::new(false);

/// Enables or disables redaction of [`Sensitive`] values process-wide.
pub fn set_safe_mode(enabled: bool) {
    SAFE_MODE.store(enabled, Ordering::Relaxed);
}

pub fn safe_mode() -> bool {
    SAFE_MODE.load(Ordering::Relaxed)
}

/// Wraps a value that should not reach the logs in safe mode.
#[derive(Debug, Clone, Copy)]
pub struct Sensitive<T>(pub T);

impl<T: fmt::Display> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if safe_mode() {
            f.write_str("[REDACTED]")
        } else {
            self.0.fmt(f)
        }
    }
}

pub trait AsSensitive {
    fn sensitive(&self) -> Sensitive<&Self>;
}

impl<T: fmt::Display + ?Sized> AsSensitive for T {
    fn sensitive(&self) -> Sensitive<&Self> {
        Sensitive(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(bytes: &[u8]) -> bool {
        let text = String::from_utf8_lossy(bytes);
        is_valid_message(bytes, &text)
    }

    #[test]
    fn test_plain_text_is_valid() {
        assert!(check(b"hello"));
        assert!(check(b"hello world\r\n"));
        assert!(check(b"\tindented"));
        assert!(check("grüße 👋".as_bytes()));
    }

    #[test]
    fn test_empty_and_whitespace_are_invalid() {
        assert!(!check(b""));
        assert!(!check(b"   "));
        assert!(!check(b"\r\n"));
        assert!(!check(b"\t \n"));
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        assert!(!check(&[0x68, 0x69, 0xff]));
        // A multi-byte sequence cut by a 64-byte chunk boundary.
        let cut = &"é".as_bytes()[..1];
        assert!(!check(cut));
    }

    #[test]
    fn test_control_characters_are_rejected() {
        assert!(!check(b"hi\x1b[31m"));
        assert!(!check(b"bell\x07"));
        assert!(!check(b"nul\x00"));
        assert!(!check(b"del\x7f"));
        assert!(contains_control_chars("\u{1}"));
        assert!(!contains_control_chars("tab\tnewline\ncr\r"));
    }

    #[test]
    fn test_line_formatting() {
        assert_eq!(server_line("Shutting down"), "[Server]Shutting down\n");
        assert_eq!(server_prompt("Enter auth token: "), "[Server]Enter auth token: ");
        assert_eq!(private_line("psst"), "[Server (private)]psst\n");
        assert_eq!(chat_line("alice", "hi\n"), "[alice]hi\n");
    }

    #[test]
    fn test_sensitive_redaction() {
        let addr = "127.0.0.1:5000";
        set_safe_mode(true);
        assert_eq!(addr.sensitive().to_string(), "[REDACTED]");
        set_safe_mode(false);
        assert_eq!(addr.sensitive().to_string(), addr);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(READ_BUFFER_SIZE, 64);
        assert_eq!(BAN_LIMIT, Duration::from_secs(600));
        assert!(MESSAGE_RATE < BAN_LIMIT);
        assert!(STRIKE_LIMIT > 0);
    }
}
