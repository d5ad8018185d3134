// tests/comment_tests.rs

use blog_backend::{config::Config, routes, state::AppState, utils::jwt::sign_jwt};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

const TEST_SECRET: &str = "comment_test_secret";

struct TestApp {
    address: String,
    pool: PgPool,
}

/// Spawns the app on a random port against the database from DATABASE_URL.
/// Returns None (skipping the test) when no database is configured.
async fn spawn_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping integration test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: TEST_SECRET.to_string(),
        rust_log: "error".to_string(),
        port: 0,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp { address, pool })
}

/// Inserts a user row directly (accounts come from the identity service in
/// production) and mints a matching bearer token.
async fn seed_user(pool: &PgPool, is_admin: bool) -> (i64, String) {
    let name = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, email, is_admin) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&name)
    .bind(format!("{name}@example.com"))
    .bind(is_admin)
    .fetch_one(pool)
    .await
    .unwrap();

    let token = sign_jwt(id, is_admin, TEST_SECRET, 600).unwrap();
    (id, token)
}

async fn seed_post(pool: &PgPool, user_id: i64) -> i64 {
    let slug = format!("post-{}", uuid::Uuid::new_v4());
    sqlx::query_scalar(
        "INSERT INTO posts (user_id, title, content, slug) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(user_id)
    .bind("Test post")
    .bind("<p>body</p>")
    .bind(&slug)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn create_comment(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    post_id: i64,
    content: &str,
) -> serde_json::Value {
    let response = client
        .post(format!("{address}/api/comments/create"))
        .header("Authorization", format!("Bearer {token}"))
        .json(&serde_json::json!({ "post_id": post_id, "content": content }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

async fn put_vote(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    comment_id: i64,
    action: &str,
) -> serde_json::Value {
    let response = client
        .put(format!("{address}/api/comments/{comment_id}/{action}"))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    response.json().await.unwrap()
}

#[tokio::test]
async fn create_comment_requires_auth() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/comments/create", app.address))
        .json(&serde_json::json!({ "post_id": 1, "content": "hello" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn create_comment_rejects_empty_content() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (admin_id, _) = seed_user(&app.pool, true).await;
    let post_id = seed_post(&app.pool, admin_id).await;
    let (_, token) = seed_user(&app.pool, false).await;

    for content in ["", "   "] {
        let response = client
            .post(format!("{}/api/comments/create", app.address))
            .header("Authorization", format!("Bearer {token}"))
            .json(&serde_json::json!({ "post_id": post_id, "content": content }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 400);
    }
}

#[tokio::test]
async fn create_comment_on_missing_post_is_404() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (_, token) = seed_user(&app.pool, false).await;

    let response = client
        .post(format!("{}/api/comments/create", app.address))
        .header("Authorization", format!("Bearer {token}"))
        .json(&serde_json::json!({ "post_id": 999999999_i64, "content": "hello" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn post_comments_are_listed_newest_first() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (admin_id, _) = seed_user(&app.pool, true).await;
    let post_id = seed_post(&app.pool, admin_id).await;
    let (_, token) = seed_user(&app.pool, false).await;

    let first = create_comment(&client, &app.address, &token, post_id, "first").await;
    let second = create_comment(&client, &app.address, &token, post_id, "second").await;

    let response = client
        .get(format!("{}/api/posts/{post_id}/comments", app.address))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    let threads: serde_json::Value = response.json().await.unwrap();
    let threads = threads.as_array().unwrap();
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0]["id"], second["id"]);
    assert_eq!(threads[1]["id"], first["id"]);
    assert_eq!(threads[0]["replies"].as_array().unwrap().len(), 0);
    assert_eq!(threads[0]["rank"], "normal");
}

#[tokio::test]
async fn reply_flow_and_orphan_policy() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (admin_id, _) = seed_user(&app.pool, true).await;
    let post_id = seed_post(&app.pool, admin_id).await;
    let (_, token) = seed_user(&app.pool, false).await;

    let c1 = create_comment(&client, &app.address, &token, post_id, "hello").await;
    let c1_id = c1["id"].as_i64().unwrap();

    // Reply to C1
    let response = client
        .post(format!("{}/api/comments/reply", app.address))
        .header("Authorization", format!("Bearer {token}"))
        .json(&serde_json::json!({
            "post_id": post_id,
            "parent_id": c1_id,
            "content": "a reply"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
    let r1: serde_json::Value = response.json().await.unwrap();
    assert_eq!(r1["parent_id"].as_i64().unwrap(), c1_id);

    // listReplies(C1) == [R1]
    let replies: serde_json::Value = client
        .get(format!("{}/api/comments/{c1_id}/replies", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let replies = replies.as_array().unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["id"], r1["id"]);

    // The thread view groups R1 under C1
    let threads: serde_json::Value = client
        .get(format!("{}/api/posts/{post_id}/comments", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let threads = threads.as_array().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0]["replies"].as_array().unwrap().len(), 1);

    // Deleting C1 retains R1 as an orphan
    let response = client
        .delete(format!("{}/api/comments/{c1_id}", app.address))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let replies: serde_json::Value = client
        .get(format!("{}/api/comments/{c1_id}/replies", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(replies.as_array().unwrap().len(), 1);

    // ...but R1 no longer shows up in any surviving thread
    let threads: serde_json::Value = client
        .get(format!("{}/api/posts/{post_id}/comments", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(threads.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn reply_requires_parent_on_same_post() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (admin_id, _) = seed_user(&app.pool, true).await;
    let post_a = seed_post(&app.pool, admin_id).await;
    let post_b = seed_post(&app.pool, admin_id).await;
    let (_, token) = seed_user(&app.pool, false).await;

    let c1 = create_comment(&client, &app.address, &token, post_a, "on post A").await;
    let c1_id = c1["id"].as_i64().unwrap();

    // Missing parent
    let response = client
        .post(format!("{}/api/comments/reply", app.address))
        .header("Authorization", format!("Bearer {token}"))
        .json(&serde_json::json!({
            "post_id": post_a,
            "parent_id": 999999999_i64,
            "content": "reply"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // Parent exists but belongs to a different post
    let response = client
        .post(format!("{}/api/comments/reply", app.address))
        .header("Authorization", format!("Bearer {token}"))
        .json(&serde_json::json!({
            "post_id": post_b,
            "parent_id": c1_id,
            "content": "reply"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn like_dislike_scenario_updates_counts_and_rank() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (admin_id, _) = seed_user(&app.pool, true).await;
    let post_id = seed_post(&app.pool, admin_id).await;

    let (_, u1) = seed_user(&app.pool, false).await;
    let (_, u2) = seed_user(&app.pool, false).await;
    let (_, u3) = seed_user(&app.pool, false).await;
    let (_, u4) = seed_user(&app.pool, false).await;

    let c1 = create_comment(&client, &app.address, &u1, post_id, "hello").await;
    let c1_id = c1["id"].as_i64().unwrap();

    // Three distinct likers push the rank to fan
    put_vote(&client, &app.address, &u2, c1_id, "like").await;
    put_vote(&client, &app.address, &u3, c1_id, "like").await;
    let body = put_vote(&client, &app.address, &u4, c1_id, "like").await;
    assert_eq!(body["liked"], true);
    assert_eq!(body["comment"]["number_of_likes"], 3);
    assert_eq!(body["comment"]["rank"], "fan");

    // U2 switches to dislike: removed from likes, rank falls back
    let body = put_vote(&client, &app.address, &u2, c1_id, "dislike").await;
    assert_eq!(body["disliked"], true);
    assert_eq!(body["comment"]["number_of_likes"], 2);
    assert_eq!(body["comment"]["number_of_dislikes"], 1);
    assert_eq!(body["comment"]["rank"], "normal");
}

#[tokio::test]
async fn like_is_an_idempotent_toggle() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (admin_id, _) = seed_user(&app.pool, true).await;
    let post_id = seed_post(&app.pool, admin_id).await;
    let (_, author) = seed_user(&app.pool, false).await;
    let (_, liker) = seed_user(&app.pool, false).await;

    let c1 = create_comment(&client, &app.address, &author, post_id, "toggle me").await;
    let c1_id = c1["id"].as_i64().unwrap();

    let body = put_vote(&client, &app.address, &liker, c1_id, "like").await;
    assert_eq!(body["liked"], true);
    assert_eq!(body["comment"]["number_of_likes"], 1);

    // Second like from the same user returns to the unliked state
    let body = put_vote(&client, &app.address, &liker, c1_id, "like").await;
    assert_eq!(body["liked"], false);
    assert_eq!(body["comment"]["number_of_likes"], 0);
    assert_eq!(body["comment"]["rank"], "normal");
}

#[tokio::test]
async fn liking_clears_a_prior_dislike() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (admin_id, _) = seed_user(&app.pool, true).await;
    let post_id = seed_post(&app.pool, admin_id).await;
    let (_, author) = seed_user(&app.pool, false).await;
    let (_, voter) = seed_user(&app.pool, false).await;

    let c1 = create_comment(&client, &app.address, &author, post_id, "make up your mind").await;
    let c1_id = c1["id"].as_i64().unwrap();

    put_vote(&client, &app.address, &voter, c1_id, "dislike").await;
    let body = put_vote(&client, &app.address, &voter, c1_id, "like").await;

    // Never in both sets at once
    assert_eq!(body["comment"]["number_of_likes"], 1);
    assert_eq!(body["comment"]["number_of_dislikes"], 0);
}

#[tokio::test]
async fn concurrent_likes_do_not_lose_updates() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (admin_id, _) = seed_user(&app.pool, true).await;
    let post_id = seed_post(&app.pool, admin_id).await;
    let (_, author) = seed_user(&app.pool, false).await;

    let c1 = create_comment(&client, &app.address, &author, post_id, "pile on").await;
    let c1_id = c1["id"].as_i64().unwrap();

    let mut tokens = Vec::new();
    for _ in 0..8 {
        tokens.push(seed_user(&app.pool, false).await.1);
    }

    // Fire all likes at once; the per-comment row lock must serialize them.
    let mut handles = Vec::new();
    for token in tokens {
        let client = client.clone();
        let address = app.address.clone();
        handles.push(tokio::spawn(async move {
            let response = client
                .put(format!("{address}/api/comments/{c1_id}/like"))
                .header("Authorization", format!("Bearer {token}"))
                .send()
                .await
                .expect("Failed to execute request");
            assert_eq!(response.status().as_u16(), 200);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Every like survived: counter matches the set, rank matches the counter
    let threads: serde_json::Value = client
        .get(format!("{}/api/posts/{post_id}/comments", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let comment = &threads.as_array().unwrap()[0];
    assert_eq!(comment["number_of_likes"], 8);
    assert_eq!(comment["number_of_dislikes"], 0);
    assert_eq!(comment["rank"], "fan");

    let stored_likes: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM comment_likes WHERE comment_id = $1")
            .bind(c1_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(stored_likes, 8);
}

#[tokio::test]
async fn comment_by_unprovisioned_user_is_404() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (admin_id, _) = seed_user(&app.pool, true).await;
    let post_id = seed_post(&app.pool, admin_id).await;

    // Valid token for an account that was never provisioned here
    let token = sign_jwt(999999999, false, TEST_SECRET, 600).unwrap();

    let response = client
        .post(format!("{}/api/comments/create", app.address))
        .header("Authorization", format!("Bearer {token}"))
        .json(&serde_json::json!({ "post_id": post_id, "content": "ghost" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn vote_on_missing_comment_is_404() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (_, token) = seed_user(&app.pool, false).await;

    let response = client
        .put(format!("{}/api/comments/999999999/like", app.address))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn edit_permissions() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (admin_id, admin_token) = seed_user(&app.pool, true).await;
    let post_id = seed_post(&app.pool, admin_id).await;
    let (_, author) = seed_user(&app.pool, false).await;
    let (_, stranger) = seed_user(&app.pool, false).await;

    let c1 = create_comment(&client, &app.address, &author, post_id, "original").await;
    let c1_id = c1["id"].as_i64().unwrap();

    // A non-author, non-admin user is rejected
    let response = client
        .put(format!("{}/api/comments/{c1_id}", app.address))
        .header("Authorization", format!("Bearer {stranger}"))
        .json(&serde_json::json!({ "content": "hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // The author may edit
    let response = client
        .put(format!("{}/api/comments/{c1_id}", app.address))
        .header("Authorization", format!("Bearer {author}"))
        .json(&serde_json::json!({ "content": "edited by author" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["content"], "edited by author");

    // So may an admin
    let response = client
        .put(format!("{}/api/comments/{c1_id}", app.address))
        .header("Authorization", format!("Bearer {admin_token}"))
        .json(&serde_json::json!({ "content": "moderated" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Editing a missing comment is 404
    let response = client
        .put(format!("{}/api/comments/999999999", app.address))
        .header("Authorization", format!("Bearer {author}"))
        .json(&serde_json::json!({ "content": "ghost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn delete_forbidden_for_stranger() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (admin_id, _) = seed_user(&app.pool, true).await;
    let post_id = seed_post(&app.pool, admin_id).await;
    let (_, author) = seed_user(&app.pool, false).await;
    let (_, stranger) = seed_user(&app.pool, false).await;

    let c1 = create_comment(&client, &app.address, &author, post_id, "keep out").await;
    let c1_id = c1["id"].as_i64().unwrap();

    let response = client
        .delete(format!("{}/api/comments/{c1_id}", app.address))
        .header("Authorization", format!("Bearer {stranger}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn admin_comment_listing() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let (admin_id, admin_token) = seed_user(&app.pool, true).await;
    let post_id = seed_post(&app.pool, admin_id).await;
    let (_, user_token) = seed_user(&app.pool, false).await;

    create_comment(&client, &app.address, &user_token, post_id, "one").await;
    create_comment(&client, &app.address, &user_token, post_id, "two").await;

    // Non-admin users are rejected
    let response = client
        .get(format!("{}/api/comments", app.address))
        .header("Authorization", format!("Bearer {user_token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Admin gets a page plus aggregate counts
    let response = client
        .get(format!("{}/api/comments?limit=1", app.address))
        .header("Authorization", format!("Bearer {admin_token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["comments"].as_array().unwrap().len(), 1);
    assert!(body["total_comments"].as_i64().unwrap() >= 2);
    assert!(body["last_month_comments"].as_i64().unwrap() >= 2);
}
