use axum::{
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::fmt;
use std::sync::Arc;

use crate::mail_service::MailService;
use crate::web::MessageView;

#[derive(Debug)]
struct AppError {
    message: String,
}

impl std::error::Error for AppError {}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.message),
        )
            .into_response()
    }
}

async fn get_inbox(
    service: Arc<MailService>,
    email: String,
) -> Result<Json<Vec<MessageView>>, AppError> {
    let messages = service.list_inbox(&email).map_err(|e| AppError {
        message: e.to_string(),
    })?;

    Ok(Json(messages.iter().map(MessageView::from_display).collect()))
}

/// JSON diagnostic endpoint, mounted alongside the HTML routes.
pub fn router(service: Arc<MailService>) -> Router {
    Router::new().route(
        "/api/inbox/:email",
        get(move |axum::extract::Path(email): axum::extract::Path<String>| async move {
            get_inbox(service.clone(), email).await
        }),
    )
}
