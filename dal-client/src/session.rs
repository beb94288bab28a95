//! Login session state.

use dal_protocol::RequestSigner;
use std::fmt;

/// Where a client is in its login lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggingIn,
    LoggedIn,
    SwitchingGroup,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::LoggedOut => "logged out",
            SessionState::LoggingIn => "logging in",
            SessionState::LoggedIn => "logged in",
            SessionState::SwitchingGroup => "switching group",
        })
    }
}

/// An authenticated session. The write-token is kept private and left out of
/// `Debug` output.
#[derive(Clone)]
pub struct Session {
    user_id: String,
    user_name: String,
    write_token: String,
    group_id: Option<String>,
    group_name: Option<String>,
    in_admin_group: bool,
}

impl Session {
    pub(crate) fn new(user_id: String, user_name: String, write_token: String) -> Self {
        Self {
            user_id,
            user_name,
            write_token,
            group_id: None,
            group_name: None,
            in_admin_group: false,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }

    pub fn is_in_admin_group(&self) -> bool {
        self.in_admin_group
    }

    /// Signer keyed with this session's write-token.
    pub fn signer(&self) -> RequestSigner {
        RequestSigner::new(self.write_token.clone())
    }

    pub(crate) fn set_group(&mut self, id: String, name: Option<String>, admin: bool) {
        self.group_id = Some(id);
        self.group_name = name;
        self.in_admin_group = admin;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("user_name", &self.user_name)
            .field("write_token", &"<redacted>")
            .field("group_id", &self.group_id)
            .field("group_name", &self.group_name)
            .field("in_admin_group", &self.in_admin_group)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_write_token() {
        let session = Session::new("7".into(), "admin".into(), "tok-123456".into());
        let debug = format!("{:?}", session);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("tok-123456"));
    }

    #[test]
    fn test_set_group() {
        let mut session = Session::new("7".into(), "admin".into(), "t".into());
        assert_eq!(session.group_id(), None);

        session.set_group("3".into(), Some("Breeders".into()), true);
        assert_eq!(session.group_id(), Some("3"));
        assert_eq!(session.group_name(), Some("Breeders"));
        assert!(session.is_in_admin_group());
    }

    #[test]
    fn test_signer_uses_write_token() {
        let session = Session::new("7".into(), "admin".into(), "tok".into());
        let signed = session
            .signer()
            .sign_update_with_nonce("http://dal/update/genus/1", [("a", Some("b"))], "1");
        assert_eq!(
            signed.signature,
            dal_protocol::signing::hmac_sha1_hex("tok", "http://dal/update/genus/11b")
        );
    }
}
