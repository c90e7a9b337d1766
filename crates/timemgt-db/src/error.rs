use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// A uniqueness constraint fired; carries the user-facing message.
    #[error("{0}")]
    DuplicateName(&'static str),

    #[error("cannot delete a tag that is still used by {0} record(s)")]
    TagInUse(i64),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// True when `err` is SQLite's unique-constraint failure.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

/// Rewrite a unique-constraint failure into [`DbError::DuplicateName`].
pub(crate) fn on_duplicate(message: &'static str) -> impl Fn(rusqlite::Error) -> DbError {
    move |err| {
        if is_unique_violation(&err) {
            DbError::DuplicateName(message)
        } else {
            DbError::Sqlite(err)
        }
    }
}
