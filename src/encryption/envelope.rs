use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use rsa::Oaep;
use sha2::Sha256;

use crate::encryption::armor;
use crate::encryption::keys;
use crate::error::{MailError, MailResult};

const MESSAGE_LABEL: &str = "MESSAGE";
const SESSION_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Encrypt a message body under a recipient's public key.
///
/// Hybrid scheme: the body is sealed with AES-256-GCM under a fresh random
/// session key, and the session key is wrapped with RSA-OAEP(SHA-256) under
/// the recipient's key. The armored payload is the wrapped key (2-byte
/// big-endian length prefix), the GCM nonce, then the ciphertext. A single
/// envelope is addressed to exactly one recipient's key.
///
/// The underlying AEAD accepts bodies of any practical mail size; the RSA
/// leg only ever wraps the 32-byte session key, so the RSA-2048 plaintext
/// limit is never in play.
pub fn encrypt(plaintext: &str, recipient_public_blob: &str) -> MailResult<String> {
    let recipient = keys::parse_public_blob(recipient_public_blob)?;
    let mut rng = rand::thread_rng();

    let mut session_key = [0u8; SESSION_KEY_LEN];
    rng.fill_bytes(&mut session_key);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&session_key)
        .map_err(|e| MailError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|e| MailError::Encryption(e.to_string()))?;

    let wrapped_key = recipient
        .key
        .encrypt(&mut rng, Oaep::new::<Sha256>(), &session_key)
        .map_err(|e| MailError::Encryption(e.to_string()))?;

    let mut payload = Vec::with_capacity(2 + wrapped_key.len() + NONCE_LEN + ciphertext.len());
    payload.extend_from_slice(&(wrapped_key.len() as u16).to_be_bytes());
    payload.extend_from_slice(&wrapped_key);
    payload.extend_from_slice(&nonce_bytes);
    payload.extend_from_slice(&ciphertext);

    let mut headers = vec![
        ("Cipher", "AES-256-GCM".to_string()),
        ("KeyWrap", "RSA-OAEP-SHA-256".to_string()),
    ];
    if let Some(uid) = recipient.uid {
        // Diagnostic only; decryption authority comes from the RSA unwrap.
        headers.push(("Recipient", uid));
    }

    Ok(armor::enarmor(MESSAGE_LABEL, &headers, &payload))
}

/// Decrypt an armored envelope with the owning identity's private key.
///
/// Fails with `KeyFormat` when the private blob is malformed, with
/// `CiphertextFormat` when the blob is not a valid envelope, and with
/// `Decryption` when this key was not the encryption target or the
/// ciphertext does not authenticate.
pub fn decrypt(blob: &str, private_blob: &str) -> MailResult<String> {
    let private_key = keys::parse_private_blob(private_blob)?;
    let block = armor::dearmor(MESSAGE_LABEL, blob)
        .map_err(|e| MailError::CiphertextFormat(e.to_string()))?;

    let payload = block.payload;
    if payload.len() < 2 {
        return Err(MailError::CiphertextFormat("envelope too short".to_string()));
    }
    let wrapped_len = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    let rest = &payload[2..];
    if rest.len() < wrapped_len + NONCE_LEN {
        return Err(MailError::CiphertextFormat(
            "truncated envelope payload".to_string(),
        ));
    }
    let (wrapped_key, rest) = rest.split_at(wrapped_len);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let session_key = private_key
        .decrypt(Oaep::new::<Sha256>(), wrapped_key)
        .map_err(|e| MailError::Decryption(e.to_string()))?;
    if session_key.len() != SESSION_KEY_LEN {
        return Err(MailError::Decryption(
            "unexpected session key length".to_string(),
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(&session_key)
        .map_err(|e| MailError::Decryption(e.to_string()))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| MailError::Decryption(e.to_string()))?;

    String::from_utf8(plaintext).map_err(|e| MailError::Decryption(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::keys::generate_keypair;

    #[test]
    fn round_trip_recovers_plaintext() {
        let (public_blob, private_blob) = generate_keypair("bob@example.com").unwrap();

        let envelope = encrypt("secret text", &public_blob).unwrap();
        assert_ne!(envelope, "secret text");
        assert!(envelope.starts_with("-----BEGIN SEALMAIL MESSAGE-----"));
        assert!(envelope.contains("Recipient: bob@example.com"));

        let plaintext = decrypt(&envelope, &private_blob).unwrap();
        assert_eq!(plaintext, "secret text");
    }

    #[test]
    fn wrong_key_fails_instead_of_returning_garbage() {
        let (bob_public, _) = generate_keypair("bob@example.com").unwrap();
        let (_, eve_private) = generate_keypair("eve@example.com").unwrap();

        let envelope = encrypt("secret text", &bob_public).unwrap();
        let err = decrypt(&envelope, &eve_private).unwrap_err();
        assert!(matches!(err, MailError::Decryption(_)));
    }

    #[test]
    fn non_envelope_blob_is_a_ciphertext_format_error() {
        let (_, private_blob) = generate_keypair("bob@example.com").unwrap();
        let err = decrypt("plain old text", &private_blob).unwrap_err();
        assert!(matches!(err, MailError::CiphertextFormat(_)));
    }

    #[test]
    fn tampered_payload_fails_to_decrypt() {
        let (public_blob, private_blob) = generate_keypair("bob@example.com").unwrap();
        let envelope = encrypt("secret text", &public_blob).unwrap();

        // Flip one character inside the base64 body.
        let mut lines: Vec<String> = envelope.lines().map(str::to_string).collect();
        let body_index = lines
            .iter()
            .rposition(|l| !l.is_empty() && !l.starts_with("-----"))
            .unwrap();
        let flipped = if lines[body_index].starts_with('A') { "B" } else { "A" };
        lines[body_index].replace_range(0..1, flipped);
        let tampered = lines.join("\n");

        assert!(decrypt(&tampered, &private_blob).is_err());
    }

    #[test]
    fn malformed_private_blob_is_a_key_format_error() {
        let (public_blob, _) = generate_keypair("bob@example.com").unwrap();
        let envelope = encrypt("secret text", &public_blob).unwrap();
        let err = decrypt(&envelope, "garbage").unwrap_err();
        assert!(matches!(err, MailError::KeyFormat(_)));
    }
}
