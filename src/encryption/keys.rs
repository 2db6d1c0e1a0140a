use log::info;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::encryption::armor;
use crate::error::{MailError, MailResult};
use crate::mail_store::db::MailStore;
use crate::mail_store::model::Identity;

pub const KEY_BITS: usize = 2048;

const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";
const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

// Keypair parameters are fixed at creation and recorded as armor headers.
const ALGORITHM: &str = "RSA-2048";
const USAGE: &str = "sign,encrypt";
const HASH: &str = "SHA-256";
const CIPHER: &str = "AES-256-GCM";

/// A recipient's public key parsed out of its stored armored blob.
#[derive(Debug)]
pub struct PublicKeyBlob {
    pub key: RsaPublicKey,
    pub uid: Option<String>,
}

/// Generate a fresh RSA-2048 keypair bound to `uid` (the identity's email).
///
/// Returns the armored public and private blobs. The public blob is SPKI
/// DER, the private blob PKCS#8 DER, both wrapped with the uid and the
/// fixed algorithm parameters as headers.
pub fn generate_keypair(uid: &str) -> MailResult<(String, String)> {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS)
        .map_err(|e| MailError::KeyGeneration(e.to_string()))?;
    let public_key = RsaPublicKey::from(&private_key);

    let public_der = public_key
        .to_public_key_der()
        .map_err(|e| MailError::KeyGeneration(e.to_string()))?;
    let private_der = private_key
        .to_pkcs8_der()
        .map_err(|e| MailError::KeyGeneration(e.to_string()))?;

    let headers = [
        ("Uid", uid.to_string()),
        ("Algo", ALGORITHM.to_string()),
        ("Usage", USAGE.to_string()),
        ("Hash", HASH.to_string()),
        ("Cipher", CIPHER.to_string()),
    ];
    let public_blob = armor::enarmor(PUBLIC_KEY_LABEL, &headers, public_der.as_bytes());
    let private_blob = armor::enarmor(PRIVATE_KEY_LABEL, &headers, private_der.as_bytes());

    Ok((public_blob, private_blob))
}

pub fn parse_public_blob(blob: &str) -> MailResult<PublicKeyBlob> {
    let block = armor::dearmor(PUBLIC_KEY_LABEL, blob)
        .map_err(|e| MailError::KeyFormat(e.to_string()))?;
    let key = RsaPublicKey::from_public_key_der(&block.payload)
        .map_err(|e| MailError::KeyFormat(e.to_string()))?;
    let uid = block.header("Uid").map(str::to_string);
    Ok(PublicKeyBlob { key, uid })
}

pub fn parse_private_blob(blob: &str) -> MailResult<RsaPrivateKey> {
    let block = armor::dearmor(PRIVATE_KEY_LABEL, blob)
        .map_err(|e| MailError::KeyFormat(e.to_string()))?;
    RsaPrivateKey::from_pkcs8_der(&block.payload).map_err(|e| MailError::KeyFormat(e.to_string()))
}

/// Guarantee key material for an identity.
///
/// If both blobs are already present they are returned unchanged and
/// nothing is written. Otherwise a fresh keypair is generated, persisted
/// onto the identity row, and returned. An existing pair is never
/// overwritten.
pub fn ensure_keys(store: &MailStore, identity: &mut Identity) -> MailResult<(String, String)> {
    if let (Some(public_blob), Some(private_blob)) = (&identity.public_key, &identity.private_key)
    {
        return Ok((public_blob.clone(), private_blob.clone()));
    }

    let (public_blob, private_blob) = generate_keypair(&identity.email)?;
    store.save_identity_keys(&identity.email, &public_blob, &private_blob)?;
    identity.public_key = Some(public_blob.clone());
    identity.private_key = Some(private_blob.clone());
    info!("Generated keypair for {}", identity.email);

    Ok((public_blob, private_blob))
}
