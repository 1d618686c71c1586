//! Device permission state

use std::fmt;

/// Last known permission for the capture devices.
///
/// Only the device session manager changes it: after an acquisition attempt or
/// when the backend reports a permission change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PermissionState {
    #[default]
    Unknown,
    Prompt,
    Granted,
    Denied,
}

impl PermissionState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Prompt => "prompt",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }

    /// Whether capture actions should render as blocked
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Denied)
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unknown() {
        assert_eq!(PermissionState::default(), PermissionState::Unknown);
    }

    #[test]
    fn only_denied_is_blocked() {
        assert!(PermissionState::Denied.is_blocked());
        assert!(!PermissionState::Granted.is_blocked());
        assert!(!PermissionState::Prompt.is_blocked());
        assert!(!PermissionState::Unknown.is_blocked());
    }
}
