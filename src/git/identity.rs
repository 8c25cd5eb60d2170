use std::sync::{Arc, RwLock};

/// Authorship identity applied to history-creating commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// Shared handle for overriding commit authorship
///
/// The caller sets or clears the override; the executor snapshots it once at
/// the start of every invocation and exports it as the `GIT_AUTHOR_*` /
/// `GIT_COMMITTER_*` environment variables. The repository's persistent
/// configuration is never touched. Clones share the same underlying value, so
/// one handle can be held by the caller and another by the executor.
///
/// Changing the override while an invocation is in flight is out of contract:
/// the snapshot taken at invocation start wins for that invocation.
#[derive(Debug, Clone, Default)]
pub struct IdentityOverride {
    inner: Arc<RwLock<Option<Identity>>>,
}

impl IdentityOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, email: &str) {
        let identity = Identity {
            name: name.to_string(),
            email: email.to_string(),
        };
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(identity);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = None;
        }
    }

    /// Snapshot of the current override, if any
    pub fn get(&self) -> Option<Identity> {
        self.inner.read().ok().and_then(|guard| guard.clone())
    }

    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unset() {
        let identity = IdentityOverride::new();
        assert!(identity.get().is_none());
        assert!(!identity.is_set());
    }

    #[test]
    fn test_set_and_get() {
        let identity = IdentityOverride::new();
        identity.set("Ada Lovelace", "ada@example.com");

        let snapshot = identity.get().unwrap();
        assert_eq!(snapshot.name, "Ada Lovelace");
        assert_eq!(snapshot.email, "ada@example.com");
    }

    #[test]
    fn test_clear() {
        let identity = IdentityOverride::new();
        identity.set("Ada Lovelace", "ada@example.com");
        identity.clear();
        assert!(identity.get().is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let identity = IdentityOverride::new();
        let clone = identity.clone();

        identity.set("Ada Lovelace", "ada@example.com");
        assert!(clone.is_set());

        clone.clear();
        assert!(!identity.is_set());
    }
}
