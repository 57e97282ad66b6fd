use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use time::Date;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{check_new_meal, check_patch, SearchQuery, SummaryQuery, TodayTotals};
use super::repo_types::{MealEntry, MealPatch, MealSlot, NewMealEntry, ReadyMadeFood};
use super::repo_types::DATE_FORMAT;
use super::summary::DailySummary;
use crate::state::AppState;

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/foods", get(search_foods))
        .route("/meals", get(list_meals))
        .route("/today/meals", get(today_meals))
        .route("/today/totals", get(today_totals))
        .route("/today/slots", get(today_slots))
        .route("/summary", get(daily_summary))
        .route("/frequent", get(most_frequent))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(create_meal))
        .route("/meals/:id", patch(update_meal).delete(delete_meal))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn search_foods(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Json<Vec<ReadyMadeFood>> {
    Json(state.store.search(&q.q))
}

#[instrument(skip(state))]
pub async fn list_meals(State(state): State<AppState>) -> Json<Vec<MealEntry>> {
    Json(state.store.meals())
}

#[instrument(skip(state, body))]
pub async fn create_meal(
    State(state): State<AppState>,
    Json(body): Json<NewMealEntry>,
) -> Result<(StatusCode, HeaderMap, Json<MealEntry>), (StatusCode, String)> {
    check_new_meal(&body).map_err(bad_request)?;
    let meal = state.store.add(body);
    info!(id = %meal.id, "meal created");

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/api/v1/meals/{}", meal.id))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    headers.insert(header::LOCATION, location);

    Ok((StatusCode::CREATED, headers, Json(meal)))
}

#[instrument(skip(state, body))]
pub async fn update_meal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MealPatch>,
) -> Result<Json<MealEntry>, (StatusCode, String)> {
    check_patch(&body).map_err(bad_request)?;
    match state.store.update(id, body) {
        Some(meal) => Ok(Json(meal)),
        None => {
            warn!(%id, "update of unknown meal");
            Err(not_found())
        }
    }
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.store.remove(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found())
    }
}

#[instrument(skip(state))]
pub async fn today_meals(State(state): State<AppState>) -> Json<Vec<MealEntry>> {
    Json(state.store.today())
}

#[instrument(skip(state))]
pub async fn today_totals(State(state): State<AppState>) -> Json<TodayTotals> {
    Json(TodayTotals {
        calories: state.store.today_total_calories(),
        macros: state.store.today_totals(),
    })
}

#[instrument(skip(state))]
pub async fn today_slots(
    State(state): State<AppState>,
) -> Json<BTreeMap<MealSlot, Vec<MealEntry>>> {
    Json(state.store.by_slot())
}

#[instrument(skip(state))]
pub async fn daily_summary(
    State(state): State<AppState>,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<DailySummary>, (StatusCode, String)> {
    let date = q
        .date
        .as_deref()
        .map(|raw| Date::parse(raw, DATE_FORMAT))
        .transpose()
        .map_err(|_| bad_request("date must be YYYY-MM-DD".to_string()))?;
    Ok(Json(state.store.daily_summary(date)))
}

#[instrument(skip(state))]
pub async fn most_frequent(State(state): State<AppState>) -> Json<Vec<MealEntry>> {
    Json(state.store.most_frequent())
}

fn bad_request(msg: String) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg)
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Meal not found".into())
}
