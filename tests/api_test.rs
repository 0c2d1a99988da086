//! End-to-end tests for the catalog HTTP API.
//! Binds the real router to a random local port and drives it with reqwest.

use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

use shelfd::{config::ShelfConfig, rest, storage::Storage, AppContext};

/// Start a server on a random port backed by a scratch data dir.
/// Returns the base URL.
async fn spawn_server(dir: &TempDir) -> String {
    // Pin the signing secret through config.toml so restarts within a test
    // (none today) and parallel tests never race on generated secrets.
    std::fs::write(
        dir.path().join("config.toml"),
        "secret_key = \"integration-test-secret\"\n",
    )
    .unwrap();

    let config = Arc::new(
        ShelfConfig::new(
            Some(0),
            Some(dir.path().to_path_buf()),
            Some("error".to_string()),
            Some("127.0.0.1".to_string()),
        )
        .unwrap(),
    );
    let storage = Arc::new(Storage::new(dir.path()).await.unwrap());
    let ctx = Arc::new(AppContext::new(config, storage));

    let router = rest::build_router(ctx);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{addr}")
}

async fn register(client: &reqwest::Client, base: &str, username: &str) -> String {
    let res = client
        .post(format!("{base}/register"))
        .json(&json!({ "username": username, "password": "hunter2x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    body["access_token"].as_str().unwrap().to_string()
}

async fn add_book(
    client: &reqwest::Client,
    base: &str,
    token: &str,
    title: &str,
    author: &str,
    year: i64,
) -> i64 {
    let res = client
        .post(format!("{base}/books"))
        .bearer_auth(token)
        .json(&json!({ "title": title, "author": author, "year": year }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;

    let body: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn register_login_me_roundtrip() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base}/register"))
        .json(&json!({
            "username": "alice",
            "password": "hunter2x",
            "email": "alice@example.com",
            "full_name": "Alice Liddell",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    // Login is an OAuth2-style urlencoded form.
    let res = client
        .post(format!("{base}/login"))
        .form(&[("username", "alice"), ("password", "hunter2x")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    let token = body["access_token"].as_str().unwrap();

    let me: Value = client
        .get(format!("{base}/me"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["username"], "alice");
    assert_eq!(me["email"], "alice@example.com");
    assert_eq!(me["full_name"], "Alice Liddell");
    assert!(me["id"].is_i64());
}

#[tokio::test]
async fn duplicate_username_and_email_rejected() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base}/register"))
        .json(&json!({
            "username": "alice",
            "password": "hunter2x",
            "email": "alice@example.com",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .post(format!("{base}/register"))
        .json(&json!({ "username": "alice", "password": "hunter2x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Username already exists");

    let res = client
        .post(format!("{base}/register"))
        .json(&json!({
            "username": "alice2",
            "password": "hunter2x",
            "email": "alice@example.com",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Email already registered");
}

#[tokio::test]
async fn login_failures_are_uniform() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();
    register(&client, &base, "alice").await;

    let wrong_password = client
        .post(format!("{base}/login"))
        .form(&[("username", "alice"), ("password", "not-it")])
        .send()
        .await
        .unwrap();
    let unknown_user = client
        .post(format!("{base}/login"))
        .form(&[("username", "nobody"), ("password", "hunter2x")])
        .send()
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), 401);
    assert_eq!(unknown_user.status(), 401);
    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_user.json().await.unwrap();
    assert_eq!(a["detail"], "Invalid username or password");
    assert_eq!(a["detail"], b["detail"]);
}

#[tokio::test]
async fn requests_without_valid_token_rejected() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{base}/me")).send().await.unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(format!("{base}/books"))
        .bearer_auth("garbage.token.here")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid token");
}

#[tokio::test]
async fn book_crud_roundtrip() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();
    let token = register(&client, &base, "alice").await;

    let id = add_book(&client, &base, &token, "Dune", "Frank Herbert", 1965).await;

    let book: Value = client
        .get(format!("{base}/books/{id}"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(book["title"], "Dune");
    assert_eq!(book["author"], "Frank Herbert");
    assert_eq!(book["year"], 1965);
    assert!(book["created_at"].is_string());

    let res = client
        .put(format!("{base}/books/{id}"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Dune Messiah",
            "author": "Frank Herbert",
            "year": 1969,
            "description": "Second of the six",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["title"], "Dune Messiah");
    assert_eq!(updated["description"], "Second of the six");

    let res = client
        .delete(format!("{base}/books/{id}"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Book deleted successfully");

    let res = client
        .get(format!("{base}/books/{id}"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Book not found");
}

#[tokio::test]
async fn books_are_invisible_across_users() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();
    let alice = register(&client, &base, "alice").await;
    let bob = register(&client, &base, "bob").await;

    let id = add_book(&client, &base, &alice, "Dune", "Frank Herbert", 1965).await;

    let res = client
        .get(format!("{base}/books/{id}"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let res = client
        .put(format!("{base}/books/{id}"))
        .bearer_auth(&bob)
        .json(&json!({ "title": "Stolen", "author": "Bob" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let res = client
        .delete(format!("{base}/books/{id}"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    // Alice's book is untouched, and Bob's listing stays empty.
    let mine: Value = client
        .get(format!("{base}/books/{id}"))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine["title"], "Dune");

    let bobs: Value = client
        .get(format!("{base}/books"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(bobs.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn listing_supports_filters_and_windows() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();
    let token = register(&client, &base, "alice").await;

    add_book(&client, &base, &token, "Dune", "Frank Herbert", 1965).await;
    add_book(&client, &base, &token, "Hyperion", "Dan Simmons", 1989).await;
    add_book(&client, &base, &token, "Endymion", "Dan Simmons", 1996).await;

    let all: Value = client
        .get(format!("{base}/books"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 3);
    // Newest first.
    assert_eq!(all[0]["title"], "Endymion");
    assert_eq!(all[2]["title"], "Dune");

    // Case-insensitive substring filter on author.
    let simmons: Value = client
        .get(format!("{base}/books?author=SIMMONS"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(simmons.as_array().unwrap().len(), 2);

    let dune: Value = client
        .get(format!("{base}/books?title=dun"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let dune = dune.as_array().unwrap();
    assert_eq!(dune.len(), 1);
    assert_eq!(dune[0]["title"], "Dune");

    let windowed: Value = client
        .get(format!("{base}/books?skip=1&limit=1"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let windowed = windowed.as_array().unwrap();
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0]["title"], "Hyperion");
}

#[tokio::test]
async fn validation_failures_are_422() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base}/register"))
        .json(&json!({ "username": "al", "password": "hunter2x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 422);

    let res = client
        .post(format!("{base}/register"))
        .json(&json!({ "username": "alice", "password": "short" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 422);

    let token = register(&client, &base, "alice").await;

    let res = client
        .post(format!("{base}/books"))
        .bearer_auth(&token)
        .json(&json!({ "title": "", "author": "someone" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 422);

    let res = client
        .post(format!("{base}/books"))
        .bearer_auth(&token)
        .json(&json!({ "title": "ok", "author": "someone", "year": 999 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 422);
}

#[tokio::test]
async fn profile_flattens_user_and_lists_books() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();
    let token = register(&client, &base, "alice").await;

    add_book(&client, &base, &token, "Dune", "Frank Herbert", 1965).await;
    add_book(&client, &base, &token, "Hyperion", "Dan Simmons", 1989).await;

    let profile: Value = client
        .get(format!("{base}/me/profile"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["username"], "alice");
    assert_eq!(profile["books_count"], 2);
    let books = profile["books"].as_array().unwrap();
    assert_eq!(books.len(), 2);
    assert_eq!(books[0]["title"], "Hyperion");
}

#[tokio::test]
async fn profile_update_changes_password_and_rejects_taken_email() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(&dir).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base}/register"))
        .json(&json!({
            "username": "alice",
            "password": "hunter2x",
            "email": "alice@example.com",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let alice: Value = res.json().await.unwrap();
    let alice = alice["access_token"].as_str().unwrap().to_string();
    let bob = register(&client, &base, "bob").await;

    // Bob cannot take Alice's email.
    let res = client
        .put(format!("{base}/me"))
        .bearer_auth(&bob)
        .json(&json!({ "email": "alice@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Email already registered");

    // Alice rotates her password and name.
    let res = client
        .put(format!("{base}/me"))
        .bearer_auth(&alice)
        .json(&json!({ "full_name": "Alice Liddell", "password": "new-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["full_name"], "Alice Liddell");
    assert_eq!(updated["email"], "alice@example.com");

    let res = client
        .post(format!("{base}/login"))
        .form(&[("username", "alice"), ("password", "hunter2x")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .post(format!("{base}/login"))
        .form(&[("username", "alice"), ("password", "new-password")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}
