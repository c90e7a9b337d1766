use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::info;

use timemgt_db::models::Page;
use timemgt_parsup::Rule;
use timemgt_types::ObjectId;
use timemgt_types::api::Envelope;
use timemgt_types::models::Tag;

use crate::auth::{AppState, blocking, read_params};
use crate::convert;
use crate::error::ApiError;
use crate::middleware::Owner;

/// `skip`/`limit` are kept as text; anything unparseable reads as 0.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub skip: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::parse(self.skip.as_deref(), self.limit.as_deref())
    }
}

/// Identifier taken from the path.
pub(crate) fn path_id(raw: &str) -> Result<ObjectId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::ValidationFailed(format!("'{}' is not a valid id", raw)))
}

const CREATE_RULES: &[Rule<'static>] = &[
    ("name", "tag name is required."),
    ("color", "tag color is required."),
];

const UPDATE_RULES: &[Rule<'static>] = &[
    ("id", "tag id is required."),
    ("name", "tag name is required."),
    ("color", "tag color is required."),
];

pub async fn create_tag(
    State(state): State<AppState>,
    Extension(Owner(uid)): Extension<Owner>,
    body: Bytes,
) -> Result<Json<Envelope<String>>, ApiError> {
    let params = read_params(&state, &body, CREATE_RULES)?;
    let name = params.text("name")?;
    let color = params.text("color")?;

    let id = ObjectId::new();
    let now = chrono::Utc::now();
    blocking(&state, move |db| db.create_tag(id, uid, &name, &color, now)).await?;

    info!("Tag {} created by {}", id, uid);
    Ok(Json(Envelope::ok(id.to_hex())))
}

pub async fn update_tag(
    State(state): State<AppState>,
    Extension(Owner(uid)): Extension<Owner>,
    body: Bytes,
) -> Result<Json<Envelope<String>>, ApiError> {
    let params = read_params(&state, &body, UPDATE_RULES)?;
    let id = params.object_id("id")?;
    let name = params.text("name")?;
    let color = params.text("color")?;

    let now = chrono::Utc::now();
    blocking(&state, move |db| db.update_tag(id, uid, &name, &color, now)).await?;

    Ok(Json(Envelope::ok("tag updated".to_string())))
}

pub async fn list_tags(
    State(state): State<AppState>,
    Extension(Owner(uid)): Extension<Owner>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Envelope<Vec<Tag>>>, ApiError> {
    let page = query.page();
    let (rows, total) = blocking(&state, move |db| {
        Ok((db.list_tags(uid, page)?, db.count_tags(uid)?))
    })
    .await?;

    let tags = rows.into_iter().filter_map(convert::tag).collect();
    Ok(Json(Envelope::ok_with_total(tags, total)))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    Extension(Owner(uid)): Extension<Owner>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<String>>, ApiError> {
    let id = path_id(&id)?;
    blocking(&state, move |db| db.delete_tag(id, uid)).await?;

    info!("Tag {} deleted by {}", id, uid);
    Ok(Json(Envelope::ok("tag deleted".to_string())))
}
