//! HTTP-level tests: the full router over the in-memory store.
//!
//! Each test signs users up through `/auth/register` + `/auth/verify-otp`,
//! then drives the API with their bearer tokens.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use skillswap::auth::OtpSender;
use skillswap::config::Config;
use skillswap::server::build_router;
use skillswap::store::memory::MemoryStore;
use skillswap::AppState;

#[derive(Default)]
struct CapturingSender {
    codes: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl OtpSender for CapturingSender {
    async fn send(&self, destination: &str, otp: &str) -> anyhow::Result<()> {
        self.codes
            .lock()
            .unwrap()
            .push((destination.to_string(), otp.to_string()));
        Ok(())
    }
}

impl CapturingSender {
    fn code_for(&self, destination: &str) -> String {
        self.codes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(d, _)| d == destination)
            .map(|(_, c)| c.clone())
            .unwrap()
    }
}

struct TestApp {
    router: Router,
    otp: Arc<CapturingSender>,
}

impl TestApp {
    fn new() -> Self {
        let otp = Arc::new(CapturingSender::default());
        let state = AppState::new(
            Config {
                jwt_secret: "test-secret".into(),
                ..Config::default()
            },
            Arc::new(MemoryStore::new()),
            otp.clone(),
        );
        Self {
            router: build_router(Arc::new(state)),
            otp,
        }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Register and verify a user; returns (user id, session token).
    async fn sign_up(&self, name: &str) -> (String, String) {
        let email = format!("{}@example.com", name.to_lowercase());
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": "pw" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let user_id = body["userId"].as_str().unwrap().to_string();

        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/verify-otp",
                None,
                Some(json!({ "userId": user_id, "otp": self.otp.code_for(&email) })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        (user_id, body["token"].as_str().unwrap().to_string())
    }
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_protected_routes_need_token() {
        let app = TestApp::new();
        let (status, body) = app.call(Method::GET, "/api/v1/requests", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");

        let (status, _) = app
            .call(Method::GET, "/api/v1/requests", Some("not-a-jwt"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_otp_is_bad_request() {
        let app = TestApp::new();
        let (_, body) = app
            .call(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({ "name": "Ann", "mobile": "+15550100", "password": "pw" })),
            )
            .await;
        let user_id = body["userId"].as_str().unwrap().to_string();
        let real = app.otp.code_for("+15550100");
        let wrong = if real == "111111" { "222222" } else { "111111" };

        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/auth/verify-otp",
                None,
                Some(json!({ "userId": user_id, "otp": wrong })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "invalid_argument");
    }

    #[tokio::test]
    async fn test_otp_locked_after_repeated_wrong_codes() {
        let app = TestApp::new();
        let (_, body) = app
            .call(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({ "name": "Ann", "email": "ann@example.com", "password": "pw" })),
            )
            .await;
        let user_id = body["userId"].as_str().unwrap().to_string();
        let real = app.otp.code_for("ann@example.com");
        let wrong = if real == "111111" { "222222" } else { "111111" };

        for _ in 0..skillswap::auth::service::MAX_OTP_ATTEMPTS {
            app.call(
                Method::POST,
                "/api/v1/auth/verify-otp",
                None,
                Some(json!({ "userId": user_id, "otp": wrong })),
            )
            .await;
        }
        let (status, _) = app
            .call(
                Method::POST,
                "/api/v1/auth/verify-otp",
                None,
                Some(json!({ "userId": user_id, "otp": real })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_verified_duplicate_conflicts() {
        let app = TestApp::new();
        app.sign_up("Ann").await;
        let (status, _) = app
            .call(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({ "name": "Ann", "email": "ann@example.com", "password": "pw" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_login_status_codes() {
        let app = TestApp::new();
        app.sign_up("Ann").await;

        let (status, _) = app
            .call(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": "nobody@example.com", "password": "pw" })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": "ann@example.com", "password": "nope" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

mod request_tests {
    use super::*;

    #[tokio::test]
    async fn test_swap_flow_over_http() {
        let app = TestApp::new();
        let (_ann, ann_token) = app.sign_up("Ann").await;
        let (bob, bob_token) = app.sign_up("Bob").await;

        let create = json!({
            "toUserId": bob,
            "offeredSkill": "Photoshop",
            "wantedSkill": "Python",
            "message": "Trade?"
        });
        let (status, req) = app
            .call(Method::POST, "/api/v1/requests", Some(&ann_token), Some(create.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(req["status"], "pending");
        assert_eq!(req["fromUserName"], "Ann");
        let id = req["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .call(Method::POST, "/api/v1/requests", Some(&ann_token), Some(create))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "duplicate_pending");

        let (_, unread) = app
            .call(Method::GET, "/api/v1/notifications/unread", Some(&bob_token), None)
            .await;
        assert_eq!(unread["count"], 1);

        // Only the recipient may accept.
        let (status, _) = app
            .call(
                Method::POST,
                &format!("/api/v1/requests/{}/accept", id),
                Some(&ann_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, accepted) = app
            .call(
                Method::POST,
                &format!("/api/v1/requests/{}/accept", id),
                Some(&bob_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(accepted["status"], "accepted");

        let (status, _) = app
            .call(
                Method::POST,
                &format!("/api/v1/requests/{}/reject", id),
                Some(&bob_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, rel) = app
            .call(
                Method::GET,
                &format!("/api/v1/relationships/{}", bob),
                Some(&ann_token),
                None,
            )
            .await;
        assert_eq!(rel["type"], "sent");
        assert_eq!(rel["status"], "accepted");

        let (_, sent) = app
            .call(Method::GET, "/api/v1/requests?type=sent", Some(&ann_token), None)
            .await;
        assert_eq!(sent.as_array().unwrap().len(), 1);

        let (status, _) = app
            .call(
                Method::DELETE,
                &format!("/api/v1/requests/{}", id),
                Some(&ann_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_outsider_gets_not_found() {
        let app = TestApp::new();
        let (_, ann_token) = app.sign_up("Ann").await;
        let (bob, bob_token) = app.sign_up("Bob").await;
        let (_, cat_token) = app.sign_up("Cat").await;

        let (_, req) = app
            .call(
                Method::POST,
                "/api/v1/requests",
                Some(&ann_token),
                Some(json!({ "toUserId": bob, "offeredSkill": "a", "wantedSkill": "b" })),
            )
            .await;
        let id = req["id"].as_str().unwrap().to_string();
        app.call(
            Method::POST,
            &format!("/api/v1/requests/{}/reject", id),
            Some(&bob_token),
            None,
        )
        .await;

        for action in ["accept", "cancel"] {
            let (status, _) = app
                .call(
                    Method::POST,
                    &format!("/api/v1/requests/{}/{}", id, action),
                    Some(&cat_token),
                    None,
                )
                .await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        let (status, _) = app
            .call(
                Method::DELETE,
                &format!("/api/v1/requests/{}", id),
                Some(&cat_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_input_status_codes() {
        let app = TestApp::new();
        let (ann, ann_token) = app.sign_up("Ann").await;

        let (status, _) = app
            .call(
                Method::POST,
                "/api/v1/requests",
                Some(&ann_token),
                Some(json!({ "toUserId": ann, "offeredSkill": "a", "wantedSkill": "b" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/v1/requests",
                Some(&ann_token),
                Some(json!({
                    "toUserId": uuid::Uuid::new_v4(),
                    "offeredSkill": "a",
                    "wantedSkill": "b"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .call(Method::GET, "/api/v1/requests/not-a-uuid", Some(&ann_token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .call(Method::GET, "/api/v1/requests?type=sideways", Some(&ann_token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod profile_tests {
    use super::*;

    #[tokio::test]
    async fn test_profile_edits_and_browse() {
        let app = TestApp::new();
        let (_, ann_token) = app.sign_up("Ann").await;
        let (bob, bob_token) = app.sign_up("Bob").await;

        let (status, me) = app
            .call(
                Method::POST,
                "/api/v1/users/me/skills-offered",
                Some(&bob_token),
                Some(json!({ "skill": "Python" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["skillsOffered"][0]["skill"], "Python");
        assert_eq!(me["skillsOffered"][0]["badge"], "none");

        let (_, browse) = app
            .call(Method::GET, "/api/v1/users/browse", Some(&ann_token), None)
            .await;
        let entries = browse.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["id"], bob.as_str());
        assert_eq!(entries[0]["requestType"], "none");
        assert!(entries[0].get("email").is_none());

        // Contact details stay private to their owner.
        let (_, public) = app
            .call(Method::GET, "/api/v1/users/public", Some(&ann_token), None)
            .await;
        assert!(public
            .as_array()
            .unwrap()
            .iter()
            .all(|u| u.get("email").is_none() && u.get("mobile").is_none()));
        let (status, other) = app
            .call(
                Method::GET,
                &format!("/api/v1/users/{}", bob),
                Some(&ann_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(other["name"], "Bob");
        assert!(other.get("email").is_none());
        let (_, me) = app
            .call(Method::GET, "/api/v1/users/me", Some(&bob_token), None)
            .await;
        assert_eq!(me["email"], "bob@example.com");

        let (status, _) = app
            .call(
                Method::PATCH,
                "/api/v1/users/me/visibility",
                Some(&bob_token),
                Some(json!({ "visibility": "private" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, browse) = app
            .call(Method::GET, "/api/v1/users/browse?filter=any", Some(&ann_token), None)
            .await;
        assert!(browse.as_array().unwrap().is_empty());

        let (status, _) = app
            .call(
                Method::GET,
                &format!("/api/v1/users/{}", bob),
                Some(&ann_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

mod ops_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_and_metrics() {
        let app = TestApp::new();
        let (status, _) = app.call(Method::GET, "/healthz", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.call(Method::GET, "/readyz", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let resp = app
            .router
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("x-request-id"));
    }
}
