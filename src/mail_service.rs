use std::sync::{Arc, Mutex, MutexGuard};

use itertools::Itertools;
use log::{debug, info, warn};

use crate::encryption::{envelope, keys};
use crate::error::{MailError, MailResult};
use crate::mail_store::db::MailStore;
use crate::mail_store::model::{split_recipients, Identity, MessageRecord, NewMessage};

/// A message body as seen by a reader: either recovered plaintext (or raw
/// text for unencrypted records), or the reason it could not be read.
/// Decryption failures end up here instead of failing the listing.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyView {
    Readable(String),
    Unreadable(String),
}

impl BodyView {
    /// Rendering used by the presentation layers; the placeholder shape
    /// matches what readers see for mail that was not addressed to them.
    pub fn render(&self) -> String {
        match self {
            BodyView::Readable(text) => text.clone(),
            BodyView::Unreadable(reason) => {
                format!("[Encrypted – cannot decrypt: {}]", reason)
            }
        }
    }
}

/// A message prepared for display to one particular identity.
#[derive(Debug, Clone)]
pub struct DisplayMessage {
    pub id: i64,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: BodyView,
    pub timestamp: i64,
    pub is_read: bool,
    pub is_encrypted: bool,
}

/// Entry point for the web and CLI layers: send, list-inbox, list-sent,
/// read-one, plus identity registration for the signup flow.
pub struct MailService {
    store: Arc<Mutex<MailStore>>,
}

impl MailService {
    pub fn new(store: Arc<Mutex<MailStore>>) -> Self {
        Self { store }
    }

    fn store(&self) -> MutexGuard<'_, MailStore> {
        self.store.lock().expect("mail store mutex poisoned")
    }

    /// Create an identity and generate its keypair, as the signup flow does.
    pub fn register_identity(&self, email: &str, name: &str) -> MailResult<Identity> {
        let store = self.store();
        let mut identity = store.create_identity(email, name)?;
        keys::ensure_keys(&store, &mut identity)?;
        info!("Registered identity {}", identity.email);
        Ok(identity)
    }

    /// Encrypt and persist a message.
    ///
    /// Keys are ensured for the sender and every parsed recipient before
    /// anything is persisted, so an unknown recipient aborts with no
    /// partial state. Key generation runs inline per recipient; the cost
    /// of a send grows with the recipient list.
    ///
    /// The body is encrypted once, under the first recipient's public key,
    /// while the stored recipients field keeps the whole list. An envelope
    /// is addressed to a single key, so later recipients cannot decrypt
    /// the stored blob.
    pub fn send(
        &self,
        sender_email: &str,
        recipients_raw: &str,
        subject: &str,
        body: &str,
    ) -> MailResult<i64> {
        let store = self.store();
        let mut sender = store
            .find_identity(sender_email)?
            .ok_or_else(|| MailError::NotFound(format!("identity '{}'", sender_email)))?;
        keys::ensure_keys(&store, &mut sender)?;

        let recipient_emails = split_recipients(recipients_raw);
        if recipient_emails.is_empty() {
            return Err(MailError::UnknownRecipient(recipients_raw.trim().to_string()));
        }

        let mut first_public_blob = None;
        for email in &recipient_emails {
            let mut recipient = store
                .find_identity(email)?
                .ok_or_else(|| MailError::UnknownRecipient(email.clone()))?;
            debug!("Ensuring keys for recipient {}", email);
            let (public_blob, _) = keys::ensure_keys(&store, &mut recipient)?;
            if first_public_blob.is_none() {
                first_public_blob = Some(public_blob);
            }
        }
        let target_blob = first_public_blob
            .ok_or_else(|| MailError::UnknownRecipient(recipients_raw.trim().to_string()))?;

        let ciphertext = envelope::encrypt(body, &target_blob)?;
        let recipients = recipient_emails.iter().join(",");
        let id = store.append(&NewMessage {
            sender: sender.email.clone(),
            recipients: recipients.clone(),
            subject: subject.to_string(),
            body: ciphertext,
            is_encrypted: true,
        })?;

        info!("Stored encrypted message {} from {} to {}", id, sender.email, recipients);
        Ok(id)
    }

    /// Messages addressed to this identity, newest first, decrypted where
    /// possible. One undecryptable message never fails the listing.
    pub fn list_inbox(&self, email: &str) -> MailResult<Vec<DisplayMessage>> {
        let store = self.store();
        let identity = store
            .find_identity(email)?
            .ok_or_else(|| MailError::NotFound(format!("identity '{}'", email)))?;
        let records = store.find_by_recipient(&identity.email)?;
        Ok(records
            .into_iter()
            .map(|record| Self::to_display(&identity, record, None))
            .collect())
    }

    /// Messages sent by this identity. Sent items are shown as read without
    /// touching the stored flag.
    pub fn list_sent(&self, email: &str) -> MailResult<Vec<DisplayMessage>> {
        let store = self.store();
        let identity = store
            .find_identity(email)?
            .ok_or_else(|| MailError::NotFound(format!("identity '{}'", email)))?;
        let records = store.find_by_sender(&identity.email)?;
        Ok(records
            .into_iter()
            .map(|record| Self::to_display(&identity, record, Some(true)))
            .collect())
    }

    /// Fetch one message by id and decrypt it for the requesting identity.
    ///
    /// There is no recipient check: any identity may fetch any id, and a
    /// reader that was not the encryption target simply gets an unreadable
    /// body.
    pub fn read_one(&self, id: i64, email: &str) -> MailResult<DisplayMessage> {
        let store = self.store();
        let identity = store
            .find_identity(email)?
            .ok_or_else(|| MailError::NotFound(format!("identity '{}'", email)))?;
        let record = store.get(id)?;
        Ok(Self::to_display(&identity, record, None))
    }

    /// Flip the stored read flag; the web detail page calls this.
    pub fn mark_read(&self, id: i64) -> MailResult<()> {
        self.store().set_read(id)
    }

    fn to_display(
        identity: &Identity,
        record: MessageRecord,
        force_read: Option<bool>,
    ) -> DisplayMessage {
        let body = if !record.is_encrypted {
            BodyView::Readable(record.body.clone())
        } else {
            match &identity.private_key {
                Some(private_blob) => match envelope::decrypt(&record.body, private_blob) {
                    Ok(plaintext) => BodyView::Readable(plaintext),
                    Err(e) => {
                        warn!("Message {} unreadable for {}: {}", record.id, identity.email, e);
                        BodyView::Unreadable(e.to_string())
                    }
                },
                None => BodyView::Unreadable(format!("no private key for {}", identity.email)),
            }
        };

        DisplayMessage {
            id: record.id,
            from: record.sender,
            to: record.recipients,
            subject: record.subject,
            body,
            timestamp: record.timestamp,
            is_read: force_read.unwrap_or(record.is_read),
            is_encrypted: record.is_encrypted,
        }
    }
}
