use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use timemgt_types::ObjectId;

use crate::auth::AppState;
use crate::error::ApiError;

/// Identity of the caller, inserted by [`require_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub ObjectId);

/// Resolve the caller through the installed strategy.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let uid = state.resolver.resolve(req.headers()).await?;
    debug!("{} {} as {} ({})", req.method(), req.uri().path(), uid, state.resolver.name());

    req.extensions_mut().insert(Owner(uid));
    Ok(next.run(req).await)
}
