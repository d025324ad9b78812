use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Document identifier. Seed documents use readable ids (`demo-js`),
/// documents created at runtime use UUID v4 strings.
pub type DocumentId = String;

/// Identity of one live connection, assigned by the gateway on accept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Fresh random identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, used for derived display names.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// Display name used when a client does not supply one.
    pub fn default_username(&self) -> String {
        format!("User_{}", self.short())
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ConnectionId::generate(), ConnectionId::generate());
    }

    #[test]
    fn test_short_prefix() {
        let id = ConnectionId::from("abcdef0123456789");
        assert_eq!(id.short(), "abcdef01");
        assert_eq!(id.default_username(), "User_abcdef01");
    }

    #[test]
    fn test_short_on_short_id() {
        let id = ConnectionId::from("abc");
        assert_eq!(id.short(), "abc");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = ConnectionId::from("conn-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"conn-1\"");
    }
}
