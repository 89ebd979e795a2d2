use blog_posts::{
    AppConfig, AppState, MemoryRepository, TimeoutRepository,
    auth::Claims,
    config::Env,
    create_router,
    models::Post,
    repository::RepositoryState,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub config: AppConfig,
}

async fn spawn_app_with(posts: Vec<Post>, config: AppConfig) -> TestApp {
    let store = Arc::new(MemoryRepository::with_posts(posts)) as RepositoryState;
    let repo = Arc::new(TimeoutRepository::new(store, config.store_timeout)) as RepositoryState;

    let state = AppState {
        repo,
        config: config.clone(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, config }
}

async fn spawn_app(posts: Vec<Post>) -> TestApp {
    spawn_app_with(posts, AppConfig::default()).await
}

fn token_for(app: &TestApp, username: &str, role: Vec<i32>) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;
    let claims = Claims {
        username: username.to_string(),
        role,
        iat: now,
        exp: now + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(app.config.jwt_secret.as_bytes()),
    )
    .unwrap()
}

fn post(id: &str, is_public: bool, author: &str, tags: &[&str]) -> Post {
    Post {
        id: id.to_string(),
        title: format!("Post {id}"),
        description: "desc".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        post: "body".to_string(),
        is_public,
        read_time: 2.0,
        author: author.to_string(),
        ..Post::default()
    }
}

fn ids(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect()
}

fn new_post_body() -> Value {
    json!({
        "title": "Ownership", "description": "Borrowing explained", "tags": ["rust"],
        "post": "Long body", "isPublic": false, "readTime": 7
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app(vec![]).await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_post_lifecycle() {
    let app = spawn_app(vec![]).await;
    let client = reqwest::Client::new();
    let bob = token_for(&app, "bob", vec![1]);
    let url = format!("{}/posts/ownership", app.address);

    // Create as bob
    let response = client
        .post(&url)
        .bearer_auth(&bob)
        .json(&new_post_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "success": true }));

    // Private: anonymous caller is refused
    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "No login");

    // Owner reads it back
    let response = client.get(&url).bearer_auth(&bob).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["author"], "bob");
    assert_eq!(body["data"]["post"], "Long body");

    // Patch one field
    let response = client
        .patch(&url)
        .bearer_auth(&bob)
        .json(&json!({ "isPublic": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Now public and otherwise unchanged
    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["isPublic"], true);
    assert_eq!(body["data"]["title"], "Ownership");

    // Delete
    let response = client.delete(&url).bearer_auth(&bob).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_create_missing_title_is_400() {
    let app = spawn_app(vec![]).await;
    let client = reqwest::Client::new();

    let mut payload = new_post_body();
    payload.as_object_mut().unwrap().remove("title");

    let response = client
        .post(format!("{}/posts/untitled", app.address))
        .json(&payload)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["errMessage"].is_string());
}

#[tokio::test]
async fn test_create_anonymous_records_anonymous_author() {
    let app = spawn_app(vec![]).await;
    let client = reqwest::Client::new();

    let mut payload = new_post_body();
    payload["isPublic"] = json!(true);
    let response = client
        .post(format!("{}/posts/anon", app.address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let body: Value = client
        .get(format!("{}/posts/anon", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["author"], "Anonymous");
}

#[tokio::test]
async fn test_unknown_id_is_404_before_auth() {
    let app = spawn_app(vec![]).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/posts/nope", app.address))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "message": "Cannot find post" }));
}

async fn all_ids(app: &TestApp, client: &reqwest::Client) -> Vec<String> {
    let body: Value = client
        .get(format!("{}/posts", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    ids(&body)
}

#[tokio::test]
async fn test_patch_unknown_id_is_404_and_writes_nothing() {
    let app = spawn_app(vec![post("kept", true, "alice", &[])]).await;
    let client = reqwest::Client::new();

    let response = client
        .patch(format!("{}/posts/nope", app.address))
        .bearer_auth("not-a-jwt")
        .json(&json!({ "title": "Renamed" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "message": "Cannot find post" }));

    assert_eq!(all_ids(&app, &client).await, vec!["kept"]);
    let body: Value = client
        .get(format!("{}/posts/kept", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["title"], "Post kept");
}

#[tokio::test]
async fn test_delete_unknown_id_is_404_and_removes_nothing() {
    let app = spawn_app(vec![post("kept", true, "alice", &[])]).await;
    let client = reqwest::Client::new();

    let response = client
        .delete(format!("{}/posts/nope", app.address))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "message": "Cannot find post" }));

    assert_eq!(all_ids(&app, &client).await, vec!["kept"]);
}

#[tokio::test]
async fn test_patch_with_empty_body_changes_nothing() {
    let app = spawn_app(vec![post("kept", true, "alice", &["x"])]).await;
    let client = reqwest::Client::new();
    let url = format!("{}/posts/kept", app.address);

    let response = client.patch(&url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "success": true }));

    let body: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["data"]["title"], "Post kept");
    assert_eq!(body["data"]["tags"], json!(["x"]));
    assert_eq!(body["data"]["post"], "body");
}

#[tokio::test]
async fn test_patch_with_malformed_body_is_400() {
    let app = spawn_app(vec![post("kept", true, "alice", &[])]).await;
    let client = reqwest::Client::new();

    let response = client
        .patch(format!("{}/posts/kept", app.address))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["errMessage"].is_string());
}

#[tokio::test]
async fn test_private_post_for_stranger_and_admin() {
    let app = spawn_app(vec![post("secret", false, "alice", &[])]).await;
    let client = reqwest::Client::new();
    let url = format!("{}/posts/secret", app.address);

    let stranger = token_for(&app, "mallory", vec![1]);
    let response = client.get(&url).bearer_auth(stranger).send().await.unwrap();
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Unauthorize");

    let admin = token_for(&app, "root", vec![0]);
    let response = client.get(&url).bearer_auth(admin).send().await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_preview_listings_apply_visibility() {
    let app = spawn_app(vec![
        post("a", true, "alice", &["x"]),
        post("b", false, "bob", &["x", "y"]),
        post("c", false, "carol", &["y"]),
    ])
    .await;
    let client = reqwest::Client::new();

    // Unconditional preview listing
    let body: Value = client
        .get(format!("{}/posts/preview", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ids(&body), vec!["a", "b", "c"]);
    assert!(body["data"][0].get("post").is_none());

    // Anonymous caller-aware listing
    let body: Value = client
        .get(format!("{}/auth/posts/preview", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ids(&body), vec!["a"]);

    // Bob by tag
    let bob = token_for(&app, "bob", vec![1]);
    let body: Value = client
        .get(format!("{}/auth/posts/tag/x", app.address))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ids(&body), vec!["a", "b"]);

    let body: Value = client
        .get(format!("{}/auth/posts/tag/y", app.address))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ids(&body), vec!["b"]);

    // Elevated caller sees every post
    let admin = token_for(&app, "root", vec![0]);
    let body: Value = client
        .get(format!("{}/auth/posts/preview", app.address))
        .bearer_auth(admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ids(&body), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_invalid_token_on_listing_is_401() {
    let app = spawn_app(vec![]).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/auth/posts/preview", app.address))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn test_local_header_bypass() {
    let app = spawn_app(vec![post("mine", false, "dev", &[])]).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/posts/mine", app.address))
        .header("x-username", "dev")
        .header("x-user-role", "1, 2")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_header_bypass_disabled_in_production() {
    let config = AppConfig {
        env: Env::Production,
        store_timeout: Duration::from_secs(5),
        ..AppConfig::default()
    };
    let app = spawn_app_with(vec![post("mine", false, "dev", &[])], config).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/posts/mine", app.address))
        .header("x-username", "dev")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}
