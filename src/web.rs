use axum::{
    response::{Html, Redirect},
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tera::Tera;

use crate::mail_service::{DisplayMessage, MailService};
use crate::settings::Config;
use anyhow::Error;
use log::info;

type AppError = Error;

/// Serializable rendering of a DisplayMessage for templates and the JSON
/// diagnostic endpoint. Unreadable bodies are rendered as their
/// placeholder here, at the presentation boundary.
#[derive(Serialize)]
pub struct MessageView {
    pub id: i64,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub timestamp: String,
    pub is_read: bool,
    pub is_encrypted: bool,
}

impl MessageView {
    pub fn from_display(message: &DisplayMessage) -> Self {
        Self {
            id: message.id,
            from: message.from.clone(),
            to: message.to.clone(),
            subject: message.subject.clone(),
            body: message.body.render(),
            timestamp: format_timestamp(message.timestamp),
            is_read: message.is_read,
            is_encrypted: message.is_encrypted,
        }
    }
}

pub fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[derive(Deserialize)]
struct SignupForm {
    email: String,
    name: String,
}

#[derive(Deserialize)]
struct ComposeForm {
    to: String,
    subject: String,
    body: String,
}

async fn render_error(tera: Arc<Tera>, error_message: String) -> Html<String> {
    let mut ctx = tera::Context::new();
    ctx.insert("error_message", &error_message);
    match tera.render("error.html", &ctx) {
        Ok(html) => Html(html),
        Err(e) => Html(format!("Error rendering error page: {}", e)),
    }
}

async fn render_listing_page(
    service: Arc<MailService>,
    tera: Arc<Tera>,
    email: String,
    sent: bool,
) -> Result<Html<String>, AppError> {
    let messages = if sent {
        service.list_sent(&email)?
    } else {
        service.list_inbox(&email)?
    };
    let views: Vec<MessageView> = messages.iter().map(MessageView::from_display).collect();

    let mut ctx = tera::Context::new();
    ctx.insert("email", &email);
    ctx.insert("messages", &views);
    let template = if sent { "sent.html" } else { "inbox.html" };
    let html = tera.render(template, &ctx)?;
    Ok(Html(html))
}

async fn render_message_detail(
    service: Arc<MailService>,
    tera: Arc<Tera>,
    email: String,
    message_id: i64,
) -> Result<Html<String>, AppError> {
    let message = service.read_one(message_id, &email)?;
    // The read flag belongs to this layer; the service never sets it.
    service.mark_read(message_id)?;

    let mut ctx = tera::Context::new();
    ctx.insert("email", &email);
    ctx.insert("message", &MessageView::from_display(&message));
    let html = tera.render("email_detail.html", &ctx)?;
    Ok(Html(html))
}

async fn render_compose_page(
    tera: Arc<Tera>,
    email: String,
    error: Option<String>,
    success: Option<String>,
) -> Result<Html<String>, AppError> {
    let mut ctx = tera::Context::new();
    ctx.insert("email", &email);
    if let Some(error) = error {
        ctx.insert("error", &error);
    }
    if let Some(success) = success {
        ctx.insert("success", &success);
    }
    let html = tera.render("compose.html", &ctx)?;
    Ok(Html(html))
}

async fn start_server(router: Router, config: &Config) -> Result<(), AppError> {
    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Server running on http://{}", address);
    axum::serve(listener, router).await?;
    Ok(())
}

async fn create_router(tera: Arc<Tera>, service: Arc<MailService>) -> Router {
    let tera_for_signup = tera.clone();
    let tera_for_inbox = tera.clone();
    let tera_for_sent = tera.clone();
    let tera_for_detail = tera.clone();
    let tera_for_compose = tera.clone();
    let tera_for_compose_post = tera.clone();
    let tera_for_error = tera.clone();
    let service_for_signup = service.clone();
    let service_for_inbox = service.clone();
    let service_for_sent = service.clone();
    let service_for_detail = service.clone();
    let service_for_compose = service.clone();

    Router::new()
        .route("/", get(|| async { Redirect::permanent("/signup") }))
        .route("/signup", get(move || {
            let tera = tera_for_signup.clone();
            async move {
                let ctx = tera::Context::new();
                match tera.render("signup.html", &ctx) {
                    Ok(html) => Html(html),
                    Err(e) => render_error(tera.clone(), format!("Error loading signup page: {}", e)).await,
                }
            }
        }))
        .route("/signup", post(move |Form(form): Form<SignupForm>| async move {
            match service_for_signup.register_identity(&form.email, &form.name) {
                Ok(identity) => Redirect::to(&format!("/inbox/{}", identity.email)),
                Err(e) => Redirect::to(&format!(
                    "/error?message={}",
                    urlencoding::encode(&format!("Signup failed: {}", e))
                )),
            }
        }))
        .route("/inbox/:email", get(move |axum::extract::Path(email): axum::extract::Path<String>| async move {
            match render_listing_page(service_for_inbox.clone(), tera_for_inbox.clone(), email, false).await {
                Ok(html) => html,
                Err(e) => render_error(tera_for_inbox.clone(), format!("Error loading inbox: {}", e)).await,
            }
        }))
        .route("/sent/:email", get(move |axum::extract::Path(email): axum::extract::Path<String>| async move {
            match render_listing_page(service_for_sent.clone(), tera_for_sent.clone(), email, true).await {
                Ok(html) => html,
                Err(e) => render_error(tera_for_sent.clone(), format!("Error loading sent messages: {}", e)).await,
            }
        }))
        .route("/email/:email/:message_id", get(move |axum::extract::Path((email, message_id)): axum::extract::Path<(String, i64)>| async move {
            match render_message_detail(service_for_detail.clone(), tera_for_detail.clone(), email, message_id).await {
                Ok(html) => html,
                Err(e) => render_error(tera_for_detail.clone(), format!("Error loading email: {}", e)).await,
            }
        }))
        .route("/compose/:email", get(move |axum::extract::Path(email): axum::extract::Path<String>| async move {
            match render_compose_page(tera_for_compose.clone(), email, None, None).await {
                Ok(html) => html,
                Err(e) => render_error(tera_for_compose.clone(), format!("Error loading compose page: {}", e)).await,
            }
        }))
        .route("/compose/:email", post(move |axum::extract::Path(email): axum::extract::Path<String>, Form(form): Form<ComposeForm>| async move {
            let (error, success) = match service_for_compose.send(&email, &form.to, &form.subject, &form.body) {
                Ok(_) => (None, Some("Email sent successfully!".to_string())),
                Err(e) => (Some(e.to_string()), None),
            };
            match render_compose_page(tera_for_compose_post.clone(), email, error, success).await {
                Ok(html) => html,
                Err(e) => render_error(tera_for_compose_post.clone(), format!("Error loading compose page: {}", e)).await,
            }
        }))
        .route("/error", get(move |axum::extract::Query(params): axum::extract::Query<std::collections::HashMap<String, String>>| async move {
            let error_message = params.get("message").cloned().unwrap_or_else(|| "Unknown error".to_string());
            render_error(tera_for_error.clone(), error_message).await
        }))
        .merge(crate::web_services::router(service))
}

pub async fn start_web_server(config: &Config, service: Arc<MailService>) -> Result<(), AppError> {
    let tera = Arc::new(Tera::new("templates/**/*.html")?);

    let router = create_router(Arc::clone(&tera), service).await;
    start_server(router, config).await
}

pub async fn entrypoint(
    config: &Config,
    service: Arc<MailService>,
) -> Result<(), Box<dyn std::error::Error>> {
    start_web_server(config, service).await.map_err(Into::into)
}
