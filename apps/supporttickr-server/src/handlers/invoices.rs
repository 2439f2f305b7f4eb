use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use supporttickr_db::models::Invoice;

use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::services::invoice_service::{CreateInvoiceRequest, InvoiceStatusRequest};
use crate::state::AppState;

pub async fn list(State(state): State<AppState>, ctx: AuthContext) -> ApiResult<Json<Vec<Invoice>>> {
    Ok(Json(state.invoices.list(&ctx).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(req): Json<CreateInvoiceRequest>,
) -> ApiResult<(StatusCode, Json<Invoice>)> {
    let invoice = state.invoices.create(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn set_status(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<InvoiceStatusRequest>,
) -> ApiResult<StatusCode> {
    state.invoices.set_status(&ctx, &id, req).await?;
    Ok(StatusCode::NO_CONTENT)
}
