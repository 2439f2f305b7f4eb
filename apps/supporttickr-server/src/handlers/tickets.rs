use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use supporttickr_db::TicketFilter;
use supporttickr_db::models::{ConversionRequest, Message, Ticket, TimeEntry};

use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::services::ticket_service::{
    AddMessageRequest, AddTimeEntryRequest, CreateTicketRequest, RequestConversionRequest,
    TicketDetail, UpdateTicketRequest,
};
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(filter): Query<TicketFilter>,
) -> ApiResult<Json<Vec<Ticket>>> {
    Ok(Json(state.tickets.list(&ctx, filter).await?))
}

pub async fn get(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<TicketDetail>> {
    Ok(Json(state.tickets.get(&ctx, &id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(req): Json<CreateTicketRequest>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    let ticket = state.tickets.create(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<UpdateTicketRequest>,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(state.tickets.update(&ctx, &id, req).await?))
}

pub async fn add_message(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<AddMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let message = state.tickets.add_message(&ctx, &id, req).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn add_time_entry(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<AddTimeEntryRequest>,
) -> ApiResult<(StatusCode, Json<TimeEntry>)> {
    let entry = state.tickets.add_time_entry(&ctx, &id, req).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn request_conversion(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<RequestConversionRequest>,
) -> ApiResult<(StatusCode, Json<ConversionRequest>)> {
    let request = state.tickets.request_conversion(&ctx, &id, req).await?;
    Ok((StatusCode::CREATED, Json(request)))
}
