pub mod auth;
pub mod convert;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod records;
pub mod routes;
pub mod tags;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use identity::{IdentityResolver, JwtAuth, RemoteAuth, SessionAuth};
pub use routes::routes;
