use serde::{Deserialize, Serialize};

/// A user account capable of holding a keypair.
///
/// Either both key blobs are set or neither is; only the key store writes
/// them, and only once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub name: String,
    pub public_key: Option<String>,
    pub private_key: Option<String>,
}

impl Identity {
    pub fn has_keys(&self) -> bool {
        self.public_key.is_some() && self.private_key.is_some()
    }
}

/// A persisted message.
///
/// `recipients` is one flat comma-separated text field; queries match
/// against the whole string, not a parsed list. `body` holds either raw
/// text or an armored envelope, discriminated solely by `is_encrypted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    pub sender: String,
    pub recipients: String,
    pub subject: String,
    pub body: String,
    pub timestamp: i64,
    pub is_read: bool,
    pub is_encrypted: bool,
}

impl MessageRecord {
    /// The stored recipients field as a parsed list, for the service
    /// boundary. Storage keeps the flat string.
    pub fn recipient_list(&self) -> Vec<String> {
        split_recipients(&self.recipients)
    }
}

/// Fields supplied by the caller on append; id and timestamp are assigned
/// by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender: String,
    pub recipients: String,
    pub subject: String,
    pub body: String,
    pub is_encrypted: bool,
}

/// Split a comma-separated address list, trimming whitespace and dropping
/// empty entries.
pub fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_recipients_trims_and_drops_empties() {
        assert_eq!(
            split_recipients(" alice@x , bob@x ,, "),
            vec!["alice@x".to_string(), "bob@x".to_string()]
        );
        assert!(split_recipients("  ").is_empty());
    }
}
