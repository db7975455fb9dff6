//! Integration tests for the ShareSpace server and the remote client.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use reqwest::{Client, Url};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::backend::{
    AuthAuthority, ContentBackend, HttpBackend, KindnessPolicy, LocalBackend, LocalSettings,
};
use crate::client::ShareSpace;
use crate::config::ClientConfig;
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{
    Category, CategoryFilter, NewPost, ProfilePicture, ProfileUpdate, SignupRequest,
    DEFAULT_BIO,
};
use crate::moderation::REJECTION_MESSAGE;
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    backend: Arc<LocalBackend>,
    temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_settings(LocalSettings::default(), true).await
    }

    async fn with_settings(settings: LocalSettings, seed_posts: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = test_state(&temp_dir, settings, seed_posts).await;
        let backend = state.backend.clone();

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            backend,
            temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A remote client with its own store in the fixture's temp dir.
    async fn remote_client(&self, name: &str) -> ShareSpace {
        let path = self.temp_dir.path().join(format!("{}.sqlite", name));
        ShareSpace::connect(&ClientConfig::remote(&self.base_url, path))
            .await
            .expect("Failed to connect client")
    }

    /// Sign up over raw HTTP and return the bearer token.
    async fn signup_token(&self, email: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/auth/signup"))
            .json(&json!({ "name": "Tester", "email": email, "password": "secret1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["token"].as_str().unwrap().to_string()
    }
}

async fn test_state(temp_dir: &TempDir, settings: LocalSettings, seed_posts: bool) -> AppState {
    let repo = Repository::open(&temp_dir.path().join("server.sqlite"))
        .await
        .expect("Failed to init DB");

    let backend = Arc::new(LocalBackend::new(repo, settings));
    if seed_posts {
        backend.seed_default_posts().await.expect("Failed to seed");
    }

    AppState { backend }
}

fn signup(name: &str, email: &str) -> SignupRequest {
    SignupRequest {
        name: name.to_string(),
        email: email.to_string(),
        password: "secret1".to_string(),
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_router_without_network() {
    let temp_dir = TempDir::new().unwrap();
    let app = create_router(test_state(&temp_dir, LocalSettings::default(), false).await);

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/posts")
                .header("authorization", "Bearer not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/posts"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_signup_login_me_logout() {
    let fixture = TestFixture::new().await;
    let token = fixture.signup_token("river@example.com").await;

    let resp = fixture
        .client
        .get(fixture.url("/api/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "river@example.com");
    assert!(body["data"]["anonymous_id"]
        .as_str()
        .unwrap()
        .starts_with("Anonymous "));

    // Duplicate signup
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/signup"))
        .json(&json!({ "name": "Again", "email": "RIVER@example.com", "password": "secret1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "DUPLICATE_ACCOUNT");

    // Wrong password
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "email": "river@example.com", "password": "nope-nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");

    // Logout revokes the token
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .get(fixture.url("/api/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_posts_hide_author_and_filter_by_category() {
    let fixture = TestFixture::new().await;
    let token = fixture.signup_token("author@example.com").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/posts"))
        .bearer_auth(&token)
        .json(&json!({ "content": "doubting myself", "category": "Self-doubt" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["mood_emoji"], "😊");
    assert_eq!(body["data"]["kindness_count"], 0);
    assert!(body["data"].get("user_id").is_none());

    let resp = fixture
        .client
        .get(fixture.url("/api/posts?category=Self-doubt"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let posts = body["data"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["content"], "doubting myself");

    let resp = fixture
        .client
        .get(fixture.url("/api/posts/mine"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert!(body["data"][0]["user_id"].is_string());

    let resp = fixture
        .client
        .get(fixture.url("/api/posts?category=Gossip"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_moderation_message_is_returned_verbatim() {
    let fixture = TestFixture::new().await;
    let token = fixture.signup_token("mod@example.com").await;

    let resp = fixture
        .client
        .get(fixture.url("/api/posts"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let post_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let resp = fixture
        .client
        .post(fixture.url(&format!("/api/posts/{}/comments", post_id)))
        .bearer_auth(&token)
        .json(&json!({ "content": "Nobody cares, honestly" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "MODERATION_REJECTED");
    assert_eq!(body["error"]["message"], REJECTION_MESSAGE);

    let resp = fixture
        .client
        .post(fixture.url("/api/posts/missing/comments"))
        .bearer_auth(&token)
        .json(&json!({ "content": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_remote_first_post_scenario() {
    let fixture = TestFixture::with_settings(LocalSettings::default(), false).await;
    let app = fixture.remote_client("fresh").await;
    app.signup(&signup("Fresh", "fresh@example.com")).await.unwrap();

    assert!(app.refresh_feed().await.unwrap().is_empty());

    let post = app
        .create_post(&NewPost::new("hello", Category::Motivation, "😊"))
        .await
        .unwrap();
    let head = app.feed().posts().await[0].clone();
    assert_eq!(head.id, post.id);
    assert_eq!(head.content, "hello");
    assert_eq!(head.mood_emoji, "😊");
    assert_eq!(head.kindness_count, 0);

    let after = app.send_kindness(&post.id).await.unwrap();
    assert_eq!(after.kindness_count, 1);
    assert_eq!(app.refresh_feed().await.unwrap()[0].kindness_count, 1);

    app.post_comment(&post.id, "you're not alone").await.unwrap();
    let thread = app.list_comments(&post.id).await.unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].content, "you're not alone");
}

#[tokio::test]
async fn test_remote_errors_round_trip() {
    let fixture = TestFixture::new().await;
    let remote = HttpBackend::new(&fixture.base_url).unwrap();
    let session = remote
        .signup(&signup("Wire", "wire@example.com"))
        .await
        .unwrap();

    // Server-side validation, bypassing the client's own check
    let err = remote
        .create_post(&session, &NewPost::new("", Category::Academics, "😢"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = remote
        .send_kindness(&session, "no-such-post")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = remote
        .login(&crate::models::LoginRequest {
            email: "wire@example.com".into(),
            password: "wrong-password".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err, AppError::InvalidCredentials);

    let err = remote.who_am_i("forged").await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_remote_all_is_union_of_categories() {
    let fixture = TestFixture::new().await;
    let remote = HttpBackend::new(&fixture.base_url).unwrap();
    let session = remote
        .signup(&signup("Union", "union@example.com"))
        .await
        .unwrap();
    remote
        .create_post(&session, &NewPost::new("crush", Category::Relationships, "🤗"))
        .await
        .unwrap();

    let all = remote.list_posts(&session, CategoryFilter::All).await.unwrap();
    let mut total = 0;
    for category in Category::ALL {
        let only = remote.list_posts(&session, category.into()).await.unwrap();
        assert!(only.iter().all(|p| p.category == category));
        let expected: Vec<_> = all.iter().filter(|p| p.category == category).cloned().collect();
        assert_eq!(only, expected);
        total += only.len();
    }
    assert_eq!(total, all.len());
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_once_per_user_kindness_over_http() {
    let fixture = TestFixture::with_settings(
        LocalSettings {
            kindness_policy: KindnessPolicy::OncePerUser,
            ..Default::default()
        },
        true,
    )
    .await;
    let app = fixture.remote_client("once").await;
    app.signup(&signup("Once", "once@example.com")).await.unwrap();
    let posts = app.refresh_feed().await.unwrap();
    let target = &posts[0];

    let first = app.send_kindness(&target.id).await.unwrap();
    let second = app.send_kindness(&target.id).await.unwrap();
    assert_eq!(first.kindness_count, target.kindness_count + 1);
    assert_eq!(second.kindness_count, first.kindness_count);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_once_per_user_kindness_parallel_over_http() {
    let fixture = TestFixture::with_settings(
        LocalSettings {
            kindness_policy: KindnessPolicy::OncePerUser,
            ..Default::default()
        },
        true,
    )
    .await;
    let token = fixture.signup_token("burst@example.com").await;

    let resp = fixture
        .client
        .get(fixture.url("/api/posts"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let post_id = body["data"][0]["id"].as_str().unwrap().to_string();
    let before = body["data"][0]["kindness_count"].as_u64().unwrap();

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let client = fixture.client.clone();
            let url = fixture.url(&format!("/api/posts/{}/kindness", post_id));
            let token = token.clone();
            tokio::spawn(async move { client.post(url).bearer_auth(token).send().await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().status(), 200);
    }

    let resp = fixture
        .client
        .get(fixture.url("/api/posts"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let after = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == post_id.as_str())
        .unwrap();
    assert_eq!(after["kindness_count"].as_u64().unwrap(), before + 1);
}

#[tokio::test]
async fn test_external_session_exchange_is_one_shot() {
    let fixture = TestFixture::new().await;
    let session_id = fixture
        .backend
        .register_external_session("google@example.com", "Gale")
        .await
        .unwrap();

    let app = fixture.remote_client("oauth").await;
    let mut url = Url::parse(&format!(
        "https://sharespace.example/dashboard#session_id={}",
        session_id
    ))
    .unwrap();
    let session = app.exchange_from_url(&mut url).await.unwrap().unwrap();
    assert_eq!(session.user.name, "Gale");
    assert_eq!(url.as_str(), "https://sharespace.example/dashboard");
    assert_eq!(app.current_user().await.unwrap(), Some(session.user));

    // Replaying the identifier fails
    let other = fixture.remote_client("replay").await;
    let err = other
        .session_gateway()
        .exchange_external_session(&session_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExternalAuthFailure(_)));
}

#[tokio::test]
async fn test_revoked_token_clears_client_session() {
    let fixture = TestFixture::new().await;
    let app = fixture.remote_client("revoked").await;
    let session = app.signup(&signup("Rev", "rev@example.com")).await.unwrap();
    app.refresh_feed().await.unwrap();

    fixture.backend.logout(&session.token).await.unwrap();

    let err = app.refresh_feed().await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
    assert_eq!(app.session_gateway().session().await, None);
    // The stale feed is still there to show
    assert_eq!(app.feed().posts().await.len(), 2);
    assert_eq!(app.current_user().await.unwrap(), None);
}

#[tokio::test]
async fn test_logout_clears_locally_when_server_unreachable() {
    let fixture = TestFixture::new().await;
    let app = fixture.remote_client("roaming").await;
    app.signup(&signup("Roam", "roam@example.com")).await.unwrap();
    drop(app);

    // A port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let path = fixture.temp_dir.path().join("roaming.sqlite");
    let offline = ShareSpace::connect(&ClientConfig::remote(dead, path))
        .await
        .unwrap();
    offline.logout().await.unwrap();

    let back_online = fixture.remote_client("roaming").await;
    assert_eq!(back_online.current_user().await.unwrap(), None);
}

#[tokio::test]
async fn test_profile_rules_with_remote_feed() {
    let fixture = TestFixture::new().await;
    let app = fixture.remote_client("profile").await;
    app.signup(&signup("Pat", "pat@example.com")).await.unwrap();

    let first = app.profile().await.unwrap();
    assert_eq!(first.bio, DEFAULT_BIO);
    assert_eq!(app.profile().await.unwrap(), first);

    // 8 MiB of base64 is 6 MiB of image
    let big = format!("data:image/jpeg;base64,{}", "A".repeat(8 * 1024 * 1024));
    let err = ProfilePicture::from_data_url(big).unwrap_err();
    assert!(matches!(err, AppError::PayloadTooLarge(_)));

    let err = app
        .update_profile(&ProfileUpdate {
            bio: Some("a".repeat(501)),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(app.profile().await.unwrap(), first);

    app.update_profile(&ProfileUpdate {
        bio: Some("x".into()),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(app.profile().await.unwrap().bio, "x");

    let post = app
        .create_post(&NewPost::new("mine", Category::Academics, "😰"))
        .await
        .unwrap();
    app.send_kindness(&post.id).await.unwrap();
    app.post_comment(&post.id, "keep going").await.unwrap();
    let summary = app.profile_summary().await.unwrap();
    assert_eq!(summary.post_count, 1);
    assert_eq!(summary.kindness_received, 1);
    assert_eq!(summary.comments_received, 1);
}
