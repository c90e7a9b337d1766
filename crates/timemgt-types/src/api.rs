use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

// -- JWT Claims --

/// Claims of a self-issued token. `sub` carries the owner identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: ObjectId,
    pub iss: String,
    pub exp: usize,
}

// -- Envelope --

/// Wire envelope shared by every endpoint, and by the remote user center.
///
/// Success: `{"ok": true, "data": ...}` with an optional `total`.
/// Failure: `{"ok": false, "errMsg": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(rename = "errMsg", skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            total: None,
            err_msg: None,
        }
    }

    pub fn ok_with_total(data: T, total: i64) -> Self {
        Self {
            total: Some(total),
            ..Self::ok(data)
        }
    }

    pub fn fail(err_msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            total: None,
            err_msg: Some(err_msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let json = serde_json::to_value(Envelope::ok("done")).unwrap();
        assert_eq!(json, serde_json::json!({ "ok": true, "data": "done" }));

        let json = serde_json::to_value(Envelope::ok_with_total(vec![1, 2], 7)).unwrap();
        assert_eq!(json, serde_json::json!({ "ok": true, "data": [1, 2], "total": 7 }));
    }

    #[test]
    fn failure_envelope_shape() {
        let json = serde_json::to_value(Envelope::<()>::fail("nope")).unwrap();
        assert_eq!(json, serde_json::json!({ "ok": false, "errMsg": "nope" }));
    }
}
