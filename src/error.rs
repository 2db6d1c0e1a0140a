use thiserror::Error;

/// Error type shared by the key store, the crypto engine, the message
/// store and the mail service.
#[derive(Error, Debug)]
pub enum MailError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Recipient '{0}' does not exist")]
    UnknownRecipient(String),

    #[error("Malformed key blob: {0}")]
    KeyFormat(String),

    #[error("Malformed message envelope: {0}")]
    CiphertextFormat(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Persistence(#[from] rusqlite::Error),
}

/// Result type alias for mail operations
pub type MailResult<T> = Result<T, MailError>;
