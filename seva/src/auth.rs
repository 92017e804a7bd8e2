//! Write authorization as seen by the client.

/// Answers whether the current user may modify the shared document.
pub trait Authorizer: Send + Sync {
    /// Returns `true` if writes are permitted.
    fn can_write(&self) -> bool;
}

/// Access level granted to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// May read and watch the document.
    #[default]
    ReadOnly,
    /// May also replace the document.
    ReadWrite,
}

impl Access {
    /// Maps a server grant onto an access level.
    #[must_use]
    pub const fn from_grant(can_write: bool) -> Self {
        if can_write {
            Self::ReadWrite
        } else {
            Self::ReadOnly
        }
    }
}

impl Authorizer for Access {
    fn can_write(&self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read-only"),
            Self::ReadWrite => write!(f, "read-write"),
        }
    }
}
