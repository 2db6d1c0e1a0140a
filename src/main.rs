mod cli;
mod encryption;
mod error;
mod mail_service;
mod mail_store;
mod settings;
mod web;
mod web_services;


use std::error::Error;
use std::sync::{Arc, Mutex};

use log::info;

use crate::mail_service::MailService;
use crate::mail_store::db::MailStore;

fn setup_logging() -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Process-wide setup, in order: logging, settings, storage. Nothing
    // else initializes state on first use.
    setup_logging()?;
    let config = settings::load_settings()?;
    let store = Arc::new(Mutex::new(MailStore::open(&config.database.path)?));
    let service = Arc::new(MailService::new(Arc::clone(&store)));

    let matches = cli::command().get_matches();
    match matches.subcommand() {
        Some(("list", _)) => {
            let store = store.lock().expect("mail store mutex poisoned");
            cli::list_messages(&store)?;
        }
        Some(("view", sub)) => {
            let id = *sub.get_one::<i64>("id").expect("id is required");
            let store = store.lock().expect("mail store mutex poisoned");
            cli::view_message(&store, id)?;
        }
        Some(("new", sub)) => {
            let from = sub.get_one::<String>("from").expect("--from is required");
            let to = sub.get_one::<String>("to").expect("--to is required");
            let subject = sub.get_one::<String>("subject").expect("has default");
            let body = sub.get_one::<String>("body").expect("has default");
            let store = store.lock().expect("mail store mutex poisoned");
            cli::create_test_message(&store, from, to, subject, body)?;
        }
        _ => {
            info!("Starting web interface");
            web::entrypoint(&config, service).await?;
        }
    }

    Ok(())
}
