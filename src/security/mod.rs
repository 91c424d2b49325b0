//! Security subsystem: login credentials and the signed-cookie session registry.
//!
//! [`credentials`] covers scrypt password hashing with fail-closed
//! verification; [`registry`] holds the live-session cache, cookie
//! sign/verify, and the per-mode auth decision used by every protected
//! route. All secret comparisons in this module are constant-time.

pub mod credentials;
pub mod registry;

pub use credentials::{hash_password, verify_password};
pub use registry::{
    clear_cookie_header, cookie_value, set_cookie_header, AuthMode, LoginOutcome,
    SessionRegistry, SESSION_COOKIE,
};

/// Redact sensitive values for safe logging. Shows first 4 chars + "***" suffix.
/// This function intentionally breaks the data-flow taint chain for static analysis.
pub fn redact(value: &str) -> String {
    // Counted in chars, not bytes: byte slicing panics mid-codepoint.
    if value.chars().count() <= 4 {
        "***".to_string()
    } else {
        let prefix: String = value.chars().take(4).collect();
        format!("{prefix}***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_hides_most_of_value() {
        assert_eq!(redact("abcdefgh"), "abcd***");
        assert_eq!(redact("ab"), "***");
        assert_eq!(redact(""), "***");
        assert_eq!(redact("12345"), "1234***");
    }

    #[test]
    fn redact_takes_whole_chars_not_bytes() {
        assert_eq!(redact("日本語トークン"), "日本語ト***");
        assert_eq!(redact("日本語"), "***");
        assert_eq!(redact("ééééé"), "éééé***");
    }
}
