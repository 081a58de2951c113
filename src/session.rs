//! Session identifiers and the resources they own.
//!
//! A session is nothing more than an opaque token. Everything it owns is
//! derived from that token: an upload directory under
//! `[storage].upload_dir` and a vector-store collection named
//! `session_<id>`. No other state is kept.

use std::fmt;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::RagError;

const COLLECTION_PREFIX: &str = "session_";
const MAX_ID_LEN: usize = 128;

/// A validated session identifier.
///
/// Identifiers are used as directory names and collection names, so only
/// ASCII alphanumerics, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Issue a fresh, globally unique identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, RagError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(RagError::InvalidSession(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the vector-store collection owned by this session.
    pub fn collection_name(&self) -> String {
        format!("{}{}", COLLECTION_PREFIX, self.0)
    }

    /// Upload directory owned by this session under `upload_root`.
    pub fn upload_dir(&self, upload_root: &Path) -> PathBuf {
        upload_root.join(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique_and_valid() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert!(SessionId::parse(a.as_str()).is_ok());
    }

    #[test]
    fn test_collection_name_is_deterministic() {
        let id = SessionId::parse("abc-123").unwrap();
        assert_eq!(id.collection_name(), "session_abc-123");
        assert_eq!(id.collection_name(), id.clone().collection_name());
    }

    #[test]
    fn test_upload_dir_is_child_of_root() {
        let id = SessionId::parse("S1").unwrap();
        assert_eq!(
            id.upload_dir(Path::new("/data/uploads")),
            PathBuf::from("/data/uploads/S1")
        );
    }

    #[test]
    fn test_rejects_path_traversal() {
        for raw in ["", "..", "../etc", "a/b", "a\\b", "with space", "é"] {
            assert!(
                matches!(SessionId::parse(raw), Err(RagError::InvalidSession(_))),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_rejects_overlong_id() {
        let raw = "a".repeat(MAX_ID_LEN + 1);
        assert!(SessionId::parse(&raw).is_err());
    }
}
