//! Key material and message envelopes for the encrypted mail store.
//!
//! `keys` generates and persists one RSA-2048 keypair per identity,
//! `envelope` turns message bodies into armored ciphertext blobs and back,
//! and `armor` is the portable text container both of them serialize to.

pub mod armor;
pub mod envelope;
pub mod keys;
