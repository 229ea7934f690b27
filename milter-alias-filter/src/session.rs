use std::fmt;

use milter_alias_common::error::SessionError;

/// The identity captured when a transaction names its sender.
///
/// Only authenticated transactions ever get one of these.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionState {
    /// `MAIL FROM`, without its angle brackets.
    pub envelope_sender: Vec<u8>,
    pub auth_account: Vec<u8>,
}

impl SessionState {
    /// Copies the sender and account out of the MTA's buffers.
    ///
    /// # Errors
    ///
    /// [`SessionError::ResourceExhausted`] if either copy cannot be
    /// allocated.
    pub fn capture(sender: &[u8], auth_account: &[u8]) -> Result<Self, SessionError> {
        Ok(Self {
            envelope_sender: copy(strip_angle_brackets(sender))?,
            auth_account: copy(auth_account)?,
        })
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field(
                "envelope_sender",
                &String::from_utf8_lossy(&self.envelope_sender),
            )
            .field("auth_account", &String::from_utf8_lossy(&self.auth_account))
            .finish()
    }
}

/// Removes one pair of surrounding `<` `>`, if both are there.
pub fn strip_angle_brackets(address: &[u8]) -> &[u8] {
    address
        .strip_prefix(b"<")
        .and_then(|inner| inner.strip_suffix(b">"))
        .unwrap_or(address)
}

fn copy(bytes: &[u8]) -> Result<Vec<u8>, SessionError> {
    let mut owned = Vec::new();
    owned.try_reserve_exact(bytes.len())?;
    owned.extend_from_slice(bytes);
    Ok(owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_strip_angle_brackets() {
        assert_eq!(strip_angle_brackets(b"<list@example.com>"), b"list@example.com");
        assert_eq!(strip_angle_brackets(b"list@example.com"), b"list@example.com");
        assert_eq!(strip_angle_brackets(b"<<list@example.com>>"), b"<list@example.com>");
        assert_eq!(strip_angle_brackets(b"<>"), b"");
    }

    #[test]
    fn test_unbalanced_brackets_kept() {
        assert_eq!(strip_angle_brackets(b"<list@example.com"), b"<list@example.com");
        assert_eq!(strip_angle_brackets(b"list@example.com>"), b"list@example.com>");
    }

    #[test]
    fn test_capture() {
        let session = SessionState::capture(b"<team@example.com>", b"alice").unwrap();

        assert_eq!(session.envelope_sender, b"team@example.com");
        assert_eq!(session.auth_account, b"alice");
    }

    #[test]
    fn test_debug_is_readable() {
        let session = SessionState::capture(b"team@example.com", b"alice").unwrap();
        let debug = format!("{session:?}");

        assert!(debug.contains("team@example.com"));
        assert!(debug.contains("alice"));
    }
}
