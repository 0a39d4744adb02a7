/// Public support portal endpoints
///
/// Everything here is reachable without a session: ticket submission,
/// tracking by ticket id plus requester email, replies, ratings, and the
/// password reset flow. Responses marked as internal notes never leave
/// this boundary.
use crate::{
    context::AppContext,
    db::models::{Priority, ResponderType, Ticket, TicketResponse},
    error::{DeskError, DeskResult},
    tickets::{NewAttachment, NewTicket},
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Build public portal routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/tickets", post(create_ticket))
        .route("/api/tickets/:ticket_id", get(track_ticket))
        .route("/api/tickets/:ticket_id/responses", post(add_reply))
        .route("/api/tickets/:ticket_id/rating", post(submit_rating))
        .route("/api/uploads", post(upload_attachment))
        .route("/api/categories", get(list_categories))
        .route("/api/account/register", post(register_account))
        .route("/api/password-reset/request", post(reset_request))
        .route("/api/password-reset/verify", post(reset_verify))
        .route("/api/password-reset/complete", post(reset_complete))
}

#[derive(Debug, Deserialize)]
struct CreateTicketRequest {
    requester_name: String,
    requester_email: String,
    requester_mobile: Option<String>,
    subject: String,
    message: String,
    priority: Option<Priority>,
    category_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct CreateTicketResponse {
    ticket_id: String,
    status: String,
    due_date: chrono::DateTime<chrono::Utc>,
}

/// Submit a new support ticket
async fn create_ticket(
    State(ctx): State<AppContext>,
    Json(req): Json<CreateTicketRequest>,
) -> DeskResult<Json<CreateTicketResponse>> {
    let ticket = ctx
        .tickets
        .create_ticket(NewTicket {
            requester_name: req.requester_name,
            requester_email: req.requester_email,
            requester_mobile: req.requester_mobile,
            subject: req.subject,
            message: req.message,
            priority: req.priority.unwrap_or(Priority::Medium),
            category_id: req.category_id,
        })
        .await?;

    Ok(Json(CreateTicketResponse {
        ticket_id: ticket.ticket_id,
        status: ticket.status.to_string(),
        due_date: ticket.due_date,
    }))
}

#[derive(Debug, Deserialize)]
struct RequesterQuery {
    email: String,
}

#[derive(Debug, Serialize)]
struct TicketView {
    ticket: Ticket,
    responses: Vec<TicketResponse>,
}

/// Track a ticket by its public id. The requester email must match the
/// one on record; a mismatch reads the same as a missing ticket.
async fn track_ticket(
    State(ctx): State<AppContext>,
    Path(ticket_id): Path<String>,
    Query(query): Query<RequesterQuery>,
) -> DeskResult<Json<TicketView>> {
    let ticket = ctx.tickets.get_for_requester(&ticket_id, &query.email).await?;
    let responses = ctx.thread.list(ticket.id, false).await?;

    Ok(Json(TicketView { ticket, responses }))
}

#[derive(Debug, Deserialize)]
struct AttachmentRef {
    file_name: String,
    reference: String,
    file_type: Option<String>,
    file_size: i64,
}

impl From<AttachmentRef> for NewAttachment {
    fn from(a: AttachmentRef) -> Self {
        NewAttachment {
            file_name: a.file_name,
            file_path: a.reference,
            file_type: a.file_type,
            file_size: a.file_size,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReplyRequest {
    message: String,
    #[serde(default)]
    attachments: Vec<AttachmentRef>,
}

/// Add a customer reply to a ticket's conversation thread
async fn add_reply(
    State(ctx): State<AppContext>,
    Path(ticket_id): Path<String>,
    Query(query): Query<RequesterQuery>,
    Json(req): Json<ReplyRequest>,
) -> DeskResult<Json<TicketResponse>> {
    let ticket = ctx.tickets.get_for_requester(&ticket_id, &query.email).await?;

    let response = ctx
        .thread
        .append(
            ticket.id,
            ResponderType::Customer,
            &ticket.requester_name,
            &req.message,
            false,
            req.attachments.into_iter().map(Into::into).collect(),
        )
        .await?;

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct RatingRequest {
    rating: i64,
    feedback: Option<String>,
}

/// Submit a one-time satisfaction rating for a resolved or closed ticket
async fn submit_rating(
    State(ctx): State<AppContext>,
    Path(ticket_id): Path<String>,
    Query(query): Query<RequesterQuery>,
    Json(req): Json<RatingRequest>,
) -> DeskResult<Json<serde_json::Value>> {
    let ticket = ctx.tickets.get_for_requester(&ticket_id, &query.email).await?;
    let rated = ctx
        .ratings
        .submit(ticket.id, req.rating, req.feedback.as_deref())
        .await?;

    Ok(Json(json!({
        "ticket_id": rated.ticket_id,
        "satisfaction_rating": rated.satisfaction_rating,
    })))
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    file_name: String,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    reference: String,
    size: i64,
}

/// Upload raw attachment bytes ahead of a ticket or reply submission
async fn upload_attachment(
    State(ctx): State<AppContext>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> DeskResult<Json<UploadResponse>> {
    if body.is_empty() {
        return Err(DeskError::Validation("Attachment is empty".to_string()));
    }
    if body.len() > ctx.config.service.attachment_upload_limit {
        return Err(DeskError::Validation(format!(
            "Attachment exceeds the {} byte limit",
            ctx.config.service.attachment_upload_limit
        )));
    }

    let stored = ctx
        .attachment_store
        .put(body.to_vec(), &query.file_name)
        .await?;

    Ok(Json(UploadResponse {
        reference: stored.reference,
        size: stored.size,
    }))
}

/// List active categories for the submission form
async fn list_categories(
    State(ctx): State<AppContext>,
) -> DeskResult<Json<serde_json::Value>> {
    let categories = ctx.categories.list_active().await?;
    Ok(Json(json!({ "categories": categories })))
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    email: String,
    password: String,
}

/// Register a portal account
async fn register_account(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterBody>,
) -> DeskResult<Json<serde_json::Value>> {
    let account = ctx.accounts.register(&req.email, &req.password).await?;
    Ok(Json(json!({ "id": account.id, "email": account.email })))
}

#[derive(Debug, Deserialize)]
struct ResetRequestBody {
    email: String,
}

/// Start a password reset. Always answers 200 so the endpoint cannot be
/// used to discover which emails have accounts.
async fn reset_request(
    State(ctx): State<AppContext>,
    Json(req): Json<ResetRequestBody>,
) -> DeskResult<Json<serde_json::Value>> {
    if let Some(code) = ctx.tokens.request_reset(&req.email).await? {
        if let Err(e) = ctx.mailer.send_password_reset_otp(&req.email, &code).await {
            tracing::warn!("Failed to send password reset email: {}", e);
        }
    }

    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Deserialize)]
struct ResetVerifyBody {
    email: String,
    code: String,
}

/// Exchange a verified OTP for a reset token
async fn reset_verify(
    State(ctx): State<AppContext>,
    Json(req): Json<ResetVerifyBody>,
) -> DeskResult<Json<serde_json::Value>> {
    let reset_token = ctx.tokens.verify_otp(&req.email, &req.code).await?;
    Ok(Json(json!({ "reset_token": reset_token })))
}

#[derive(Debug, Deserialize)]
struct ResetCompleteBody {
    reset_token: String,
    new_password: String,
}

/// Complete a password reset with the token from the verify step
async fn reset_complete(
    State(ctx): State<AppContext>,
    Json(req): Json<ResetCompleteBody>,
) -> DeskResult<Json<serde_json::Value>> {
    ctx.tokens
        .reset_password(&req.reset_token, &req.new_password)
        .await?;
    Ok(Json(json!({ "status": "ok" })))
}
