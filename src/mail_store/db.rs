use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};

use crate::error::{MailError, MailResult};
use crate::mail_store::model::{Identity, MessageRecord, NewMessage};

const MESSAGE_COLUMNS: &str =
    "id, sender, recipients, subject, body, timestamp, is_read, is_encrypted";

/// SQLite-backed store for identities and messages.
///
/// The connection is not `Sync`; callers share the store behind a mutex.
pub struct MailStore {
    conn: Connection,
}

impl MailStore {
    pub fn open(path: &str) -> MailResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    pub fn open_in_memory() -> MailResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> SqlResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS identities (
                email TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                public_key TEXT,
                private_key TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender TEXT NOT NULL,
                recipients TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                is_read BOOLEAN NOT NULL DEFAULT 0,
                is_encrypted BOOLEAN NOT NULL DEFAULT 0
            )",
            [],
        )?;

        Ok(())
    }

    pub fn create_identity(&self, email: &str, name: &str) -> MailResult<Identity> {
        self.conn.execute(
            "INSERT INTO identities (email, name) VALUES (?1, ?2)",
            params![email, name],
        )?;
        Ok(Identity {
            email: email.to_string(),
            name: name.to_string(),
            public_key: None,
            private_key: None,
        })
    }

    pub fn find_identity(&self, email: &str) -> MailResult<Option<Identity>> {
        let mut stmt = self.conn.prepare(
            "SELECT email, name, public_key, private_key FROM identities WHERE email = ?1",
        )?;
        let identity = stmt
            .query_row(params![email], |row| {
                Ok(Identity {
                    email: row.get(0)?,
                    name: row.get(1)?,
                    public_key: row.get(2)?,
                    private_key: row.get(3)?,
                })
            })
            .optional()?;
        Ok(identity)
    }

    /// Persist a keypair onto an identity row. Both blobs are written in
    /// one statement so the two-fields-together invariant holds.
    pub fn save_identity_keys(
        &self,
        email: &str,
        public_blob: &str,
        private_blob: &str,
    ) -> MailResult<()> {
        let updated = self.conn.execute(
            "UPDATE identities SET public_key = ?1, private_key = ?2 WHERE email = ?3",
            params![public_blob, private_blob, email],
        )?;
        if updated == 0 {
            return Err(MailError::NotFound(format!("identity '{}'", email)));
        }
        Ok(())
    }

    /// Store a message, assigning its id and creation timestamp.
    pub fn append(&self, message: &NewMessage) -> MailResult<i64> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO messages (sender, recipients, subject, body, timestamp, is_read, is_encrypted)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                message.sender,
                message.recipients,
                message.subject,
                message.body,
                timestamp,
                message.is_encrypted
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Messages addressed to `email`, newest first.
    ///
    /// The match is case-insensitive equality against the whole recipients
    /// field; a multi-recipient record only matches a query for the full
    /// stored string.
    pub fn find_by_recipient(&self, email: &str) -> MailResult<Vec<MessageRecord>> {
        self.query_messages(
            &format!(
                "SELECT {} FROM messages WHERE recipients = ?1 COLLATE NOCASE
                 ORDER BY timestamp DESC, id DESC",
                MESSAGE_COLUMNS
            ),
            email,
        )
    }

    /// Messages sent by `email`, newest first. Case-insensitive.
    pub fn find_by_sender(&self, email: &str) -> MailResult<Vec<MessageRecord>> {
        self.query_messages(
            &format!(
                "SELECT {} FROM messages WHERE sender = ?1 COLLATE NOCASE
                 ORDER BY timestamp DESC, id DESC",
                MESSAGE_COLUMNS
            ),
            email,
        )
    }

    pub fn get(&self, id: i64) -> MailResult<MessageRecord> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS))?;
        let record = stmt
            .query_row(params![id], Self::row_to_message)
            .optional()?;
        record.ok_or_else(|| MailError::NotFound(format!("message {}", id)))
    }

    /// Mark a message read. Idempotent; a missing id is a no-op.
    pub fn set_read(&self, id: i64) -> MailResult<()> {
        self.conn
            .execute("UPDATE messages SET is_read = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// All messages, newest first, for the diagnostic CLI.
    pub fn list_all(&self, limit: u32) -> MailResult<Vec<MessageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM messages ORDER BY timestamp DESC, id DESC LIMIT ?1",
            MESSAGE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit], Self::row_to_message)?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn count_messages(&self) -> MailResult<i64> {
        let count =
            self.conn
                .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count)
    }

    fn query_messages(&self, sql: &str, param: &str) -> MailResult<Vec<MessageRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![param], Self::row_to_message)?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    fn row_to_message(row: &rusqlite::Row) -> SqlResult<MessageRecord> {
        Ok(MessageRecord {
            id: row.get(0)?,
            sender: row.get(1)?,
            recipients: row.get(2)?,
            subject: row.get(3)?,
            body: row.get(4)?,
            timestamp: row.get(5)?,
            is_read: row.get(6)?,
            is_encrypted: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(messages: &[(&str, &str)]) -> MailStore {
        let store = MailStore::open_in_memory().unwrap();
        for (sender, recipients) in messages {
            store
                .append(&NewMessage {
                    sender: sender.to_string(),
                    recipients: recipients.to_string(),
                    subject: "subject".to_string(),
                    body: "body".to_string(),
                    is_encrypted: false,
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn append_assigns_increasing_ids() {
        let store = MailStore::open_in_memory().unwrap();
        let first = store
            .append(&NewMessage {
                sender: "alice@x".to_string(),
                recipients: "bob@x".to_string(),
                subject: "one".to_string(),
                body: "body".to_string(),
                is_encrypted: false,
            })
            .unwrap();
        let second = store
            .append(&NewMessage {
                sender: "alice@x".to_string(),
                recipients: "bob@x".to_string(),
                subject: "two".to_string(),
                body: "body".to_string(),
                is_encrypted: false,
            })
            .unwrap();
        assert!(second > first);
    }

    #[test]
    fn listings_are_newest_first() {
        let store = store_with(&[("alice@x", "bob@x"), ("carol@x", "bob@x"), ("dan@x", "bob@x")]);
        let inbox = store.find_by_recipient("bob@x").unwrap();
        let ids: Vec<i64> = inbox.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn recipient_match_is_case_insensitive() {
        let store = store_with(&[("alice@x", "bob@x")]);
        assert_eq!(store.find_by_recipient("BOB@X").unwrap().len(), 1);
        assert_eq!(store.find_by_sender("ALICE@X").unwrap().len(), 1);
    }

    #[test]
    fn recipient_match_is_against_the_whole_field() {
        // Documented quirk: a recipient inside a multi-recipient string is
        // invisible to a single-address query.
        let store = store_with(&[("alice@x", "bob@x,carol@x")]);
        assert!(store.find_by_recipient("bob@x").unwrap().is_empty());
        assert_eq!(store.find_by_recipient("bob@x,carol@x").unwrap().len(), 1);
    }

    #[test]
    fn get_missing_id_is_not_found() {
        let store = MailStore::open_in_memory().unwrap();
        assert!(matches!(store.get(42), Err(MailError::NotFound(_))));
    }

    #[test]
    fn set_read_is_idempotent() {
        let store = store_with(&[("alice@x", "bob@x")]);
        store.set_read(1).unwrap();
        store.set_read(1).unwrap();
        assert!(store.get(1).unwrap().is_read);
        // Missing ids are a no-op.
        store.set_read(99).unwrap();
    }

    #[test]
    fn save_identity_keys_requires_an_existing_row() {
        let store = MailStore::open_in_memory().unwrap();
        let err = store
            .save_identity_keys("ghost@x", "pub", "priv")
            .unwrap_err();
        assert!(matches!(err, MailError::NotFound(_)));
    }
}
