use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use chrono::Utc;
use tracing::{debug, info};

use timemgt_db::models::StatisticFilter;
use timemgt_parsup::{Params, Rule};
use timemgt_types::ObjectId;
use timemgt_types::api::Envelope;
use timemgt_types::models::{Record, StatisticEntry};

use crate::auth::{AppState, blocking, read_params};
use crate::convert;
use crate::error::ApiError;
use crate::middleware::Owner;
use crate::tags::{PageQuery, path_id};

const CREATE_RULES: &[Rule<'static>] = &[
    ("event", "event is required."),
    ("tid", "at least one tag id is required."),
];

const UPDATE_RULES: &[Rule<'static>] = &[
    ("id", "record id is required."),
    ("event", "event is required."),
    ("tid", "at least one tag id is required."),
];

/// Non-empty tag set of a create/update body.
fn tag_ids(params: &Params) -> Result<Vec<ObjectId>, ApiError> {
    let tids = params.object_ids("tid")?;
    if tids.is_empty() {
        return Err(ApiError::ValidationFailed(
            "at least one tag id is required.".into(),
        ));
    }
    Ok(tids)
}

pub async fn create_record(
    State(state): State<AppState>,
    Extension(Owner(uid)): Extension<Owner>,
    body: Bytes,
) -> Result<Json<Envelope<String>>, ApiError> {
    let params = read_params(&state, &body, CREATE_RULES)?;
    let event = params.text("event")?;
    let tids = tag_ids(&params)?;

    let id = ObjectId::new();
    let now = Utc::now();
    let duration = blocking(&state, move |db| {
        db.create_record(id, uid, &tids, &event, now)
    })
    .await?;

    debug!("Record {} by {} took {}ns", id, uid, duration);
    Ok(Json(Envelope::ok(id.to_hex())))
}

pub async fn update_record(
    State(state): State<AppState>,
    Extension(Owner(uid)): Extension<Owner>,
    body: Bytes,
) -> Result<Json<Envelope<String>>, ApiError> {
    let params = read_params(&state, &body, UPDATE_RULES)?;
    let id = params.object_id("id")?;
    let event = params.text("event")?;
    let tids = tag_ids(&params)?;

    let now = Utc::now();
    blocking(&state, move |db| {
        db.update_record(id, uid, &tids, &event, now)
    })
    .await?;

    Ok(Json(Envelope::ok("record updated".to_string())))
}

pub async fn list_records(
    State(state): State<AppState>,
    Extension(Owner(uid)): Extension<Owner>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Envelope<Vec<Record>>>, ApiError> {
    let page = query.page();
    let (rows, total) = blocking(&state, move |db| {
        Ok((db.list_records(uid, page)?, db.count_records(uid)?))
    })
    .await?;

    let records = rows.into_iter().filter_map(convert::record).collect();
    Ok(Json(Envelope::ok_with_total(records, total)))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Extension(Owner(uid)): Extension<Owner>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<String>>, ApiError> {
    let id = path_id(&id)?;
    blocking(&state, move |db| db.delete_record(id, uid)).await?;

    info!("Record {} deleted by {}", id, uid);
    Ok(Json(Envelope::ok("record deleted".to_string())))
}

/// Filter from an optional body: `dateRange` and `tids`, both optional.
fn statistic_filter(state: &AppState, body: &[u8]) -> Result<StatisticFilter, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StatisticFilter::default());
    }

    let params = read_params(state, body, &[])?;
    let range = params
        .time_range("dateRange")?
        .map(|(start, end)| (start.with_timezone(&Utc), end.with_timezone(&Utc)));
    let tag_ids = params.opt_object_ids("tids")?.unwrap_or_default();

    Ok(StatisticFilter { range, tag_ids })
}

pub async fn statistic(
    State(state): State<AppState>,
    Extension(Owner(uid)): Extension<Owner>,
    body: Bytes,
) -> Result<Json<Envelope<Vec<StatisticEntry>>>, ApiError> {
    let filter = statistic_filter(&state, &body)?;
    let rows = blocking(&state, move |db| db.statistic(uid, &filter)).await?;

    let entries = rows.into_iter().filter_map(convert::statistic).collect();
    Ok(Json(Envelope::ok(entries)))
}
