use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{records, tags};

/// The `/v1` API. User routes exist only when the deployment issues its
/// own tokens (`state.jwt` set).
pub fn routes(state: AppState) -> Router {
    let local_accounts = state.jwt.is_some();

    let mut public_routes = Router::new();
    let mut protected_routes = Router::new()
        .route("/v1/tag/create", post(tags::create_tag))
        .route("/v1/tag/update", put(tags::update_tag))
        .route("/v1/tag/list", get(tags::list_tags))
        .route("/v1/tag/{id}", delete(tags::delete_tag))
        .route("/v1/record/create", post(records::create_record))
        .route("/v1/record/update", put(records::update_record))
        .route("/v1/record/list", get(records::list_records))
        .route("/v1/record/statistic", post(records::statistic))
        .route("/v1/record/{id}", delete(records::delete_record));

    if local_accounts {
        public_routes = public_routes
            .route("/v1/user/register", post(auth::register))
            .route("/v1/user/login", post(auth::login));
        protected_routes = protected_routes.route("/v1/user/profile", get(auth::profile));
    }

    let protected_routes =
        protected_routes.layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use timemgt_db::Database;
    use timemgt_parsup::ParamsPolicy;
    use timemgt_types::ObjectId;

    use super::*;
    use crate::auth::AppStateInner;
    use crate::error::AUTH_CHALLENGE;
    use crate::identity::JwtAuth;

    struct TestApp {
        router: Router,
        jwt: Arc<JwtAuth>,
    }

    impl TestApp {
        fn new() -> Self {
            let jwt = Arc::new(JwtAuth::new("router-test-secret"));
            let state = Arc::new(AppStateInner {
                db: Database::open_in_memory().unwrap(),
                resolver: jwt.clone(),
                jwt: Some(jwt.clone()),
                policy: ParamsPolicy::default(),
                db_timeout: Duration::from_secs(5),
            });
            Self {
                router: routes(state),
                jwt,
            }
        }

        fn token(&self, uid: ObjectId) -> String {
            self.jwt.issue(uid).unwrap()
        }

        async fn call(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let body = match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            };

            let resp = self
                .router
                .clone()
                .oneshot(req.body(body).unwrap())
                .await
                .unwrap();
            let status = resp.status();
            let bytes = resp.into_body().collect().await.unwrap().to_bytes();
            (status, serde_json::from_slice(&bytes).unwrap())
        }
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized_with_challenge() {
        let app = TestApp::new();
        let resp = app
            .router
            .clone()
            .oneshot(
                Request::get("/v1/tag/list")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], AUTH_CHALLENGE);
    }

    #[tokio::test]
    async fn register_login_and_profile() {
        let app = TestApp::new();
        let body = json!({ "name": "ann", "email": " Ann@Example.com", "pwd": "hunter22" });
        let (status, reg) = app.call(Method::POST, "/v1/user/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reg["ok"], true);

        let (_, again) = app
            .call(
                Method::POST,
                "/v1/user/register",
                None,
                Some(json!({ "name": "x", "email": "ann@example.com", "pwd": "p" })),
            )
            .await;
        assert_eq!(again["ok"], false);
        assert_eq!(again["errMsg"], "email is already registered");

        let (_, bad) = app
            .call(
                Method::POST,
                "/v1/user/login",
                None,
                Some(json!({ "email": "ann@example.com", "pwd": "wrong" })),
            )
            .await;
        assert_eq!(bad["errMsg"], "email and password do not match");

        let (_, login) = app
            .call(
                Method::POST,
                "/v1/user/login",
                None,
                Some(json!({ "email": "ANN@example.com", "pwd": "hunter22" })),
            )
            .await;
        let token = login["data"].as_str().unwrap().to_string();

        let (_, profile) = app.call(Method::GET, "/v1/user/profile", Some(&token), None).await;
        assert_eq!(profile["data"]["email"], "ann@example.com");
        assert!(profile["data"].get("password").is_none());
    }

    #[tokio::test]
    async fn tag_lifecycle() {
        let app = TestApp::new();
        let token = app.token(ObjectId::new());
        let t = Some(token.as_str());

        let (_, created) = app
            .call(Method::POST, "/v1/tag/create", t, Some(json!({ "name": "work", "color": "#f00" })))
            .await;
        assert_eq!(created["ok"], true);
        let id = created["data"].as_str().unwrap().to_string();

        let (_, dup) = app
            .call(Method::POST, "/v1/tag/create", t, Some(json!({ "name": "work", "color": "#0f0" })))
            .await;
        assert_eq!(dup["errMsg"], "a tag with this name already exists");

        let (_, updated) = app
            .call(
                Method::PUT,
                "/v1/tag/update",
                t,
                Some(json!({ "id": id, "name": "deep work", "color": "#00f" })),
            )
            .await;
        assert_eq!(updated["ok"], true);

        let (_, list) = app.call(Method::GET, "/v1/tag/list?skip=x&limit=10", t, None).await;
        assert_eq!(list["total"], 1);
        assert_eq!(list["data"][0]["name"], "deep work");

        let (_, deleted) = app.call(Method::DELETE, &format!("/v1/tag/{}", id), t, None).await;
        assert_eq!(deleted["ok"], true);
    }

    #[tokio::test]
    async fn tag_in_use_is_refused() {
        let app = TestApp::new();
        let token = app.token(ObjectId::new());
        let t = Some(token.as_str());

        let (_, tag) = app
            .call(Method::POST, "/v1/tag/create", t, Some(json!({ "name": "a", "color": "#fff" })))
            .await;
        let tid = tag["data"].as_str().unwrap().to_string();
        let (_, rec) = app
            .call(Method::POST, "/v1/record/create", t, Some(json!({ "event": "coding", "tid": [tid] })))
            .await;
        assert_eq!(rec["ok"], true);

        let (status, refused) = app.call(Method::DELETE, &format!("/v1/tag/{}", tid), t, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(refused["ok"], false);
    }

    #[tokio::test]
    async fn rejects_injection_missing_fields_and_empty_body() {
        let app = TestApp::new();
        let token = app.token(ObjectId::new());
        let t = Some(token.as_str());

        let (_, injected) = app
            .call(Method::POST, "/v1/tag/create", t, Some(json!({ "name": "$gt", "color": "#fff" })))
            .await;
        assert_eq!(injected["ok"], false);
        assert!(injected["errMsg"].as_str().unwrap().contains("$[]{}()"));

        let (_, missing) = app.call(Method::POST, "/v1/record/create", t, Some(json!({}))).await;
        let msg = missing["errMsg"].as_str().unwrap();
        assert!(msg.contains("event is required."));
        assert!(msg.contains("at least one tag id is required."));

        let (_, empty) = app.call(Method::POST, "/v1/tag/create", t, None).await;
        assert_eq!(empty["ok"], false);

        let (_, no_tags) = app
            .call(Method::POST, "/v1/record/create", t, Some(json!({ "event": "x", "tid": [] })))
            .await;
        assert_eq!(no_tags["ok"], false);
    }

    #[tokio::test]
    async fn records_and_statistics_are_owner_scoped() {
        let app = TestApp::new();
        let ann = app.token(ObjectId::new());
        let bob = app.token(ObjectId::new());

        let mut tids = Vec::new();
        for name in ["a", "b"] {
            let (_, tag) = app
                .call(
                    Method::POST,
                    "/v1/tag/create",
                    Some(&ann),
                    Some(json!({ "name": name, "color": "#fff" })),
                )
                .await;
            tids.push(tag["data"].as_str().unwrap().to_string());
        }
        for tid in [&tids[0], &tids[1], &tids[0]] {
            app.call(
                Method::POST,
                "/v1/record/create",
                Some(&ann),
                Some(json!({ "event": "work", "tid": [tid] })),
            )
            .await;
        }

        let (_, list) = app.call(Method::GET, "/v1/record/list", Some(&ann), None).await;
        assert_eq!(list["total"], 3);
        assert_eq!(list["data"][2]["duration"], 0);

        let (_, foreign) = app.call(Method::GET, "/v1/record/list", Some(&bob), None).await;
        assert_eq!(foreign["total"], 0);

        let (_, all) = app.call(Method::POST, "/v1/record/statistic", Some(&ann), None).await;
        assert_eq!(all["ok"], true);
        assert_eq!(all["data"].as_array().unwrap().len(), 2);

        let (_, only_b) = app
            .call(
                Method::POST,
                "/v1/record/statistic",
                Some(&ann),
                Some(json!({ "tids": [tids[1]] })),
            )
            .await;
        let entries = only_b["data"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["tagId"], tids[1].as_str());

        let (_, bad_range) = app
            .call(
                Method::POST,
                "/v1/record/statistic",
                Some(&ann),
                Some(json!({ "dateRange": ["yesterday", "today"] })),
            )
            .await;
        assert_eq!(bad_range["ok"], false);
    }
}
