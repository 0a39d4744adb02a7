/// Admin desk endpoints
///
/// Bearer-token protected surface for support staff: ticket queue,
/// full conversation threads including internal notes, lifecycle
/// transitions, assignment, and category management.
use crate::{
    api::AdminAuth,
    categories::CategoryInput,
    context::AppContext,
    db::models::{Priority, ResponderType, Ticket, TicketAttachment, TicketResponse},
    error::DeskResult,
    tickets::TicketStatus,
};
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Build admin routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/admin/tickets", get(list_tickets))
        .route("/api/admin/tickets/:id", get(get_ticket))
        .route("/api/admin/tickets/:id", delete(delete_ticket))
        .route("/api/admin/tickets/:id/responses", post(add_response))
        .route("/api/admin/tickets/:id/status", post(update_status))
        .route("/api/admin/tickets/:id/assign", post(assign_ticket))
        .route("/api/admin/tickets/:id/priority", post(set_priority))
        .route("/api/admin/categories", get(list_categories))
        .route("/api/admin/categories", post(create_category))
        .route("/api/admin/categories/:id", put(update_category))
        .route("/api/admin/categories/:id", delete(delete_category))
}

#[derive(Debug, Deserialize)]
struct ListTicketsQuery {
    status: Option<TicketStatus>,
}

#[derive(Debug, Serialize)]
struct TicketSummary {
    #[serde(flatten)]
    ticket: Ticket,
    sla_breached: bool,
}

/// List active tickets, optionally filtered by status
async fn list_tickets(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Query(query): Query<ListTicketsQuery>,
) -> DeskResult<Json<serde_json::Value>> {
    let now = chrono::Utc::now();
    let tickets: Vec<TicketSummary> = ctx
        .tickets
        .list_active(query.status)
        .await?
        .into_iter()
        .map(|ticket| TicketSummary {
            sla_breached: ticket.is_sla_breached(now),
            ticket,
        })
        .collect();

    Ok(Json(json!({ "tickets": tickets })))
}

#[derive(Debug, Serialize)]
struct TicketDetail {
    ticket: Ticket,
    responses: Vec<TicketResponse>,
    attachments: Vec<TicketAttachment>,
    sla_breached: bool,
}

/// Get a ticket with its full thread, internal notes included. Viewing
/// marks the ticket as read.
async fn get_ticket(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
) -> DeskResult<Json<TicketDetail>> {
    let ticket = ctx.tickets.get(id).await?;
    let responses = ctx.thread.list(id, true).await?;
    let attachments = ctx.thread.list_attachments(id).await?;

    if !ticket.is_read {
        ctx.tickets.mark_read(id).await?;
    }

    Ok(Json(TicketDetail {
        sla_breached: ticket.is_sla_breached(chrono::Utc::now()),
        ticket,
        responses,
        attachments,
    }))
}

/// Soft-delete a ticket
async fn delete_ticket(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
) -> DeskResult<Json<serde_json::Value>> {
    ctx.tickets.soft_delete(id).await?;
    Ok(Json(json!({ "status": "deleted" })))
}

#[derive(Debug, Deserialize)]
struct AdminReplyRequest {
    message: String,
    #[serde(default)]
    is_internal: bool,
    responder_name: Option<String>,
}

/// Add a staff reply or internal note to a ticket
async fn add_response(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
    Json(req): Json<AdminReplyRequest>,
) -> DeskResult<Json<TicketResponse>> {
    let response = ctx
        .thread
        .append(
            id,
            ResponderType::Admin,
            req.responder_name.as_deref().unwrap_or("Support"),
            &req.message,
            req.is_internal,
            Vec::new(),
        )
        .await?;

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: TicketStatus,
}

/// Move a ticket along the lifecycle
async fn update_status(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> DeskResult<Json<Ticket>> {
    let ticket = ctx.tickets.update_status(id, req.status).await?;
    Ok(Json(ticket))
}

#[derive(Debug, Deserialize)]
struct AssignRequest {
    assigned_to: Option<String>,
}

/// Assign or unassign a ticket
async fn assign_ticket(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
    Json(req): Json<AssignRequest>,
) -> DeskResult<Json<Ticket>> {
    let ticket = ctx.tickets.assign(id, req.assigned_to.as_deref()).await?;
    Ok(Json(ticket))
}

#[derive(Debug, Deserialize)]
struct SetPriorityRequest {
    priority: Priority,
}

/// Change a ticket's priority
async fn set_priority(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
    Json(req): Json<SetPriorityRequest>,
) -> DeskResult<Json<Ticket>> {
    let ticket = ctx.tickets.set_priority(id, req.priority).await?;
    Ok(Json(ticket))
}

#[derive(Debug, Deserialize)]
struct CategoryRequest {
    name: String,
    #[serde(default = "default_color")]
    color: String,
    sla_hours: Option<i64>,
    #[serde(default)]
    display_order: i64,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_color() -> String {
    "#6c757d".to_string()
}

fn default_active() -> bool {
    true
}

/// List active categories
async fn list_categories(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
) -> DeskResult<Json<serde_json::Value>> {
    let categories = ctx.categories.list_active().await?;
    Ok(Json(json!({ "categories": categories })))
}

/// Create a category
async fn create_category(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Json(req): Json<CategoryRequest>,
) -> DeskResult<Json<serde_json::Value>> {
    let category = ctx
        .categories
        .create(CategoryInput {
            name: req.name,
            color: req.color,
            sla_hours: req.sla_hours,
            display_order: req.display_order,
        })
        .await?;

    Ok(Json(json!({ "category": category })))
}

/// Update a category
async fn update_category(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
    Json(req): Json<CategoryRequest>,
) -> DeskResult<Json<serde_json::Value>> {
    let category = ctx
        .categories
        .update(
            id,
            CategoryInput {
                name: req.name,
                color: req.color,
                sla_hours: req.sla_hours,
                display_order: req.display_order,
            },
            req.is_active,
        )
        .await?;

    Ok(Json(json!({ "category": category })))
}

/// Soft-delete a category. Existing tickets keep their assignment.
async fn delete_category(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
) -> DeskResult<Json<serde_json::Value>> {
    ctx.categories.soft_delete(id).await?;
    Ok(Json(json!({ "status": "deleted" })))
}
