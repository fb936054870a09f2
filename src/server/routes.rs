use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use chrono::{Datelike, Local, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppState;
use super::error::ApiError;
use crate::expenses::ExpenseReport;
use crate::scheduler::DispatchOutcome;
use crate::service::{BillInput, SettingsInput};
use crate::store::{Bill, Settings};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn bill_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim().parse().map_err(|_| ApiError::NotFound)
}

pub(super) async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    }))
}

pub(super) async fn list_bills(State(state): State<AppState>) -> ApiResult<Vec<Bill>> {
    Ok(Json(state.service.list_bills()?))
}

pub(super) async fn get_bill(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Bill> {
    Ok(Json(state.service.get_bill(bill_id(&id)?)?))
}

pub(super) async fn create_bill(
    State(state): State<AppState>,
    body: Result<Json<BillInput>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(input) = body?;
    let id = state.service.create_bill(&input).await?;
    Ok(Json(json!({ "id": id, "message": "Bill created successfully" })))
}

pub(super) async fn update_bill(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<BillInput>, JsonRejection>,
) -> ApiResult<Value> {
    let id = bill_id(&id)?;
    let Json(input) = body?;
    let changes = state.service.update_bill(id, &input).await?;
    Ok(Json(json!({ "message": "Bill updated successfully", "changes": changes })))
}

pub(super) async fn delete_bill(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let changes = state.service.delete_bill(bill_id(&id)?).await?;
    Ok(Json(json!({ "message": "Bill deleted successfully", "changes": changes })))
}

pub(super) async fn get_settings(State(state): State<AppState>) -> ApiResult<Settings> {
    Ok(Json(state.service.settings()?))
}

pub(super) async fn update_settings(
    State(state): State<AppState>,
    body: Result<Json<SettingsInput>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(input) = body?;
    state.service.update_settings(&input)?;
    Ok(Json(json!({ "message": "Settings updated successfully" })))
}

pub(super) async fn trigger_notifications(State(state): State<AppState>) -> ApiResult<Value> {
    match state.dispatcher.check_and_notify().await? {
        DispatchOutcome::AlreadyRunning => Err(ApiError::Busy),
        DispatchOutcome::Disabled => Ok(Json(json!({
            "message": "Notification check triggered",
            "summary": null,
        }))),
        DispatchOutcome::Completed(summary) => Ok(Json(json!({
            "message": "Notification check triggered",
            "summary": summary,
        }))),
    }
}

#[derive(Deserialize)]
pub(super) struct ExpensesQuery {
    year: Option<i32>,
}

pub(super) async fn expenses(
    State(state): State<AppState>,
    Query(query): Query<ExpensesQuery>,
) -> ApiResult<ExpenseReport> {
    let today = Local::now().date_naive();
    let year = query.year.unwrap_or_else(|| today.year());
    Ok(Json(state.service.expenses(year, today)?))
}
