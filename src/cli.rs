use clap::{Arg, Command};

use crate::error::MailResult;
use crate::mail_store::db::MailStore;
use crate::mail_store::model::NewMessage;
use crate::web::format_timestamp;

/// Diagnostic surface over the raw store. These commands bypass the mail
/// service and the crypto engine entirely: `new` inserts an unencrypted
/// record next to the encrypted ones, and `list`/`view` print stored
/// fields verbatim, ciphertext included.
pub fn command() -> Command {
    Command::new("sealmail")
        .about("Local webmail with an encrypted message store")
        .subcommand(Command::new("serve").about("Run the web interface (default)"))
        .subcommand(Command::new("list").about("Print the newest stored messages, raw"))
        .subcommand(
            Command::new("view")
                .about("Print one message's raw fields by id")
                .arg(
                    Arg::new("id")
                        .required(true)
                        .value_parser(clap::value_parser!(i64)),
                ),
        )
        .subcommand(
            Command::new("new")
                .about("Insert a raw unencrypted test message")
                .arg(Arg::new("from").long("from").required(true))
                .arg(Arg::new("to").long("to").required(true))
                .arg(Arg::new("subject").long("subject").default_value("Hello"))
                .arg(Arg::new("body").long("body").default_value("Test body")),
        )
}

pub fn list_messages(store: &MailStore) -> MailResult<()> {
    println!("=== All local emails (latest first) ===");
    for message in store.list_all(50)? {
        println!(
            "[{}] {} | from={} to={} subj={}",
            message.id,
            format_timestamp(message.timestamp),
            message.sender,
            message.recipients,
            message.subject
        );
    }
    Ok(())
}

pub fn view_message(store: &MailStore, id: i64) -> MailResult<()> {
    let message = store.get(id)?;
    println!("----");
    println!("From: {}", message.sender);
    println!("To: {}", message.recipients);
    println!("Subject: {}", message.subject);
    println!("Date: {}", format_timestamp(message.timestamp));
    println!("Read: {} | Encrypted: {}", message.is_read, message.is_encrypted);
    println!("Body:\n{}", message.body);
    println!("----");
    Ok(())
}

pub fn create_test_message(
    store: &MailStore,
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> MailResult<()> {
    let id = store.append(&NewMessage {
        sender: from.to_string(),
        recipients: to.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        is_encrypted: false,
    })?;
    println!("Created email id {}", id);
    Ok(())
}
