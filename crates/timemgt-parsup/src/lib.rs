//! Request parameter support.
//!
//! Decodes untrusted JSON bodies into [`Params`]: identifier-shaped strings
//! become [`timemgt_types::ObjectId`]s, RFC 3339 strings become local
//! timestamps, and strings carrying query operator characters are refused.

pub mod error;
pub mod required;
pub mod sanitize;
pub mod value;

pub use error::ParamError;
pub use required::{Rule, check_required};
pub use sanitize::{ParamsPolicy, sanitize};
pub use value::{Param, Params};
