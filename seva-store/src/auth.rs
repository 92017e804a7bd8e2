//! Write authorization for the document store.
//!
//! Reads are open to every connected client. Writes require one of the
//! configured admin tokens; with no tokens configured the store is read-only.

use std::collections::HashSet;

/// The set of admin tokens allowed to replace the document.
#[derive(Debug, Clone, Default)]
pub struct TokenAuthority {
    tokens: HashSet<String>,
}

impl TokenAuthority {
    /// Builds an authority from the configured tokens. Empty strings are ignored.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.is_empty())
                .collect(),
        }
    }

    /// Whether a client presenting `token` may write.
    #[must_use]
    pub fn is_authorized(&self, token: Option<&str>) -> bool {
        token.is_some_and(|t| self.tokens.contains(t))
    }

    /// Returns `true` if no client can ever write.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.tokens.is_empty()
    }
}
