//! End-to-end tests for member browsing, profile editing, photo upload,
//! and photo moderation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::multipart;
use reqwest::Client;
use serde_json::json;
use tempfile::TempDir;

use amoret::config::Config;
use amoret::db;
use amoret::routes;
use amoret::state::{AppState, DbPool};
use amoret::storage::LocalPhotoStorage;

struct TestApp {
    base_url: String,
    pool: DbPool,
    uploads_dir: PathBuf,
    _tmp: TempDir,
}

async fn spawn_app() -> TestApp {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.database.path = Some(tmp.path().join("test.db"));
    config.storage.path = Some(tmp.path().join("uploads"));
    config.seed.demo_members = false;

    let pool = db::create_pool(config.db_path()).unwrap();
    db::run_migrations(&pool).unwrap();

    let photo_storage = Arc::new(LocalPhotoStorage::new(config.uploads_path().clone()));
    let state = AppState::new(pool.clone(), config, photo_storage);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{addr}"),
        pool,
        uploads_dir: tmp.path().join("uploads"),
        _tmp: tmp,
    }
}

impl TestApp {
    fn grant_roles(&self, username: &str, roles: &[&str]) {
        let conn = self.pool.get().unwrap();
        for role in roles {
            conn.execute(
                "INSERT OR IGNORE INTO user_roles (user_id, role_id)
                 SELECT u.id, r.id FROM users u, roles r
                 WHERE u.username = ?1 AND r.name = ?2",
                rusqlite::params![username, role],
            )
            .unwrap();
        }
    }
}

/// Registers a member and returns their bearer token.
async fn register(client: &Client, base_url: &str, username: &str, gender: &str) -> String {
    let response = client
        .post(format!("{base_url}/api/account/register"))
        .json(&json!({
            "username": username,
            "password": "correct-horse",
            "known_as": username,
            "gender": gender,
            "date_of_birth": "1990-04-12",
            "city": "Lisbon",
            "country": "Portugal",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

fn photo_form() -> multipart::Form {
    let part = multipart::Part::bytes(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
        .file_name("portrait.jpg")
        .mime_str("image/jpeg")
        .unwrap();
    multipart::Form::new().part("file", part)
}

async fn upload_photo(client: &Client, base_url: &str, token: &str) -> serde_json::Value {
    let response = client
        .post(format!("{base_url}/api/members/photos"))
        .bearer_auth(token)
        .multipart(photo_form())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
async fn member_list_excludes_self_and_defaults_to_opposite_gender() {
    let app = spawn_app().await;
    let client = Client::new();

    let todd = register(&client, &app.base_url, "todd", "male").await;
    register(&client, &app.base_url, "lisa", "female").await;
    register(&client, &app.base_url, "greg", "male").await;

    let response = client
        .get(format!("{}/api/members", app.base_url))
        .bearer_auth(&todd)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["total_count"], 1);
    assert_eq!(body["items"][0]["username"], "lisa");
    assert_eq!(body["page"], 1);
    assert_eq!(body["total_pages"], 1);

    // Explicit filter overrides the default
    let response = client
        .get(format!("{}/api/members?gender=male", app.base_url))
        .bearer_auth(&todd)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["items"][0]["username"], "greg");
}

#[tokio::test]
async fn member_list_pages_results() {
    let app = spawn_app().await;
    let client = Client::new();

    let todd = register(&client, &app.base_url, "todd", "male").await;
    for name in ["ann", "bea", "cat", "dot", "eve"] {
        register(&client, &app.base_url, name, "female").await;
    }

    let response = client
        .get(format!(
            "{}/api/members?page=2&page_size=2",
            app.base_url
        ))
        .bearer_auth(&todd)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["total_count"], 5);
    assert_eq!(body["page"], 2);
    assert_eq!(body["page_size"], 2);
    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn member_list_orders_by_activity_unless_told_otherwise() {
    let app = spawn_app().await;
    let client = Client::new();

    let todd = register(&client, &app.base_url, "todd", "male").await;
    register(&client, &app.base_url, "ann", "female").await;
    register(&client, &app.base_url, "bea", "female").await;

    // ann holds the oldest account, bea has not been seen for a week
    {
        let conn = app.pool.get().unwrap();
        conn.execute(
            "UPDATE users SET created_at = datetime('now', '-30 days') WHERE username = 'ann'",
            [],
        )
        .unwrap();
        conn.execute(
            "UPDATE users SET last_active = datetime('now', '-7 days') WHERE username = 'bea'",
            [],
        )
        .unwrap();
    }

    let response = client
        .get(format!("{}/api/members", app.base_url))
        .bearer_auth(&todd)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["items"][0]["username"], "ann");

    let response = client
        .get(format!("{}/api/members?order_by=created", app.base_url))
        .bearer_auth(&todd)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["items"][0]["username"], "bea");
}

#[tokio::test]
async fn member_detail_includes_age_and_profile() {
    let app = spawn_app().await;
    let client = Client::new();

    let todd = register(&client, &app.base_url, "todd", "male").await;
    register(&client, &app.base_url, "lisa", "female").await;

    let response = client
        .get(format!("{}/api/members/LISA", app.base_url))
        .bearer_auth(&todd)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["username"], "lisa");
    assert_eq!(body["city"], "Lisbon");
    assert!(body["age"].as_i64().unwrap() >= 18);

    let response = client
        .get(format!("{}/api/members/nobody", app.base_url))
        .bearer_auth(&todd)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn profile_update_is_visible_to_others() {
    let app = spawn_app().await;
    let client = Client::new();

    let lisa = register(&client, &app.base_url, "lisa", "female").await;
    let todd = register(&client, &app.base_url, "todd", "male").await;

    let response = client
        .put(format!("{}/api/members", app.base_url))
        .bearer_auth(&lisa)
        .json(&json!({
            "introduction": "Hello there",
            "looking_for": "Hiking partner",
            "interests": "Sourdough",
            "city": "Porto",
            "country": "Portugal",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = client
        .get(format!("{}/api/members/lisa", app.base_url))
        .bearer_auth(&todd)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["introduction"], "Hello there");
    assert_eq!(body["city"], "Porto");
}

#[tokio::test]
async fn uploaded_photo_needs_approval_before_strangers_see_it() {
    let app = spawn_app().await;
    let client = Client::new();

    let lisa = register(&client, &app.base_url, "lisa", "female").await;
    let todd = register(&client, &app.base_url, "todd", "male").await;

    let photo = upload_photo(&client, &app.base_url, &lisa).await;
    assert_eq!(photo["is_approved"], false);
    assert_eq!(photo["is_main"], false);

    // The file itself is served
    let response = client
        .get(format!("{}{}", app.base_url, photo["url"].as_str().unwrap()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "image/jpeg"
    );

    // The owner sees the pending photo; a stranger does not
    let response = client
        .get(format!("{}/api/members/lisa", app.base_url))
        .bearer_auth(&lisa)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["photos"].as_array().unwrap().len(), 1);

    let response = client
        .get(format!("{}/api/members/lisa", app.base_url))
        .bearer_auth(&todd)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["photos"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn non_image_uploads_are_rejected() {
    let app = spawn_app().await;
    let client = Client::new();
    let lisa = register(&client, &app.base_url, "lisa", "female").await;

    let part = multipart::Part::bytes(b"#!/bin/sh".to_vec())
        .file_name("script.sh")
        .mime_str("text/x-shellscript")
        .unwrap();
    let form = multipart::Form::new().part("file", part);

    let response = client
        .post(format!("{}/api/members/photos", app.base_url))
        .bearer_auth(&lisa)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn failed_photo_insert_leaves_no_file_behind() {
    let app = spawn_app().await;
    let client = Client::new();
    let lisa = register(&client, &app.base_url, "lisa", "female").await;

    // Break the insert without touching auth or storage
    {
        let conn = app.pool.get().unwrap();
        conn.execute_batch("DROP TABLE photos").unwrap();
    }

    let response = client
        .post(format!("{}/api/members/photos", app.base_url))
        .bearer_auth(&lisa)
        .multipart(photo_form())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);

    let leftover = std::fs::read_dir(&app.uploads_dir).unwrap().count();
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn moderation_flow_approves_and_promotes_first_photo() {
    let app = spawn_app().await;
    let client = Client::new();

    let lisa = register(&client, &app.base_url, "lisa", "female").await;
    let mod_token = register(&client, &app.base_url, "mora", "female").await;
    app.grant_roles("mora", &["Moderator"]);

    let photo = upload_photo(&client, &app.base_url, &lisa).await;
    let photo_id = photo["id"].as_str().unwrap();

    // Members cannot reach the moderation queue
    let response = client
        .get(format!("{}/api/admin/photos-to-moderate", app.base_url))
        .bearer_auth(&lisa)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = client
        .get(format!("{}/api/admin/photos-to-moderate", app.base_url))
        .bearer_auth(&mod_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let queue: serde_json::Value = response.json().await.unwrap();
    assert_eq!(queue.as_array().unwrap().len(), 1);
    assert_eq!(queue[0]["username"], "lisa");

    let response = client
        .post(format!(
            "{}/api/admin/photos/{photo_id}/approve",
            app.base_url
        ))
        .bearer_auth(&mod_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    // First approved photo becomes the main photo
    let response = client
        .get(format!("{}/api/members/lisa", app.base_url))
        .bearer_auth(&lisa)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["photos"][0]["is_main"], true);
    assert_eq!(body["photo_url"], body["photos"][0]["url"]);
}

#[tokio::test]
async fn rejecting_a_photo_removes_it_and_its_file() {
    let app = spawn_app().await;
    let client = Client::new();

    let lisa = register(&client, &app.base_url, "lisa", "female").await;
    let mod_token = register(&client, &app.base_url, "mora", "female").await;
    app.grant_roles("mora", &["Moderator"]);

    let photo = upload_photo(&client, &app.base_url, &lisa).await;
    let photo_id = photo["id"].as_str().unwrap();
    let photo_url = photo["url"].as_str().unwrap().to_string();

    let response = client
        .post(format!(
            "{}/api/admin/photos/{photo_id}/reject",
            app.base_url
        ))
        .bearer_auth(&mod_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = client
        .get(format!("{}/api/members/lisa", app.base_url))
        .bearer_auth(&lisa)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["photos"].as_array().unwrap().len(), 0);

    // The stored file is gone too
    let response = client
        .get(format!("{}{photo_url}", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn main_photo_swap_and_delete_rules() {
    let app = spawn_app().await;
    let client = Client::new();

    let lisa = register(&client, &app.base_url, "lisa", "female").await;
    let mod_token = register(&client, &app.base_url, "mora", "female").await;
    app.grant_roles("mora", &["Moderator"]);

    let first = upload_photo(&client, &app.base_url, &lisa).await;
    let second = upload_photo(&client, &app.base_url, &lisa).await;
    let first_id = first["id"].as_str().unwrap();
    let second_id = second["id"].as_str().unwrap();

    // Unapproved photos cannot become main
    let response = client
        .put(format!(
            "{}/api/members/photos/{second_id}/main",
            app.base_url
        ))
        .bearer_auth(&lisa)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    for id in [first_id, second_id] {
        client
            .post(format!("{}/api/admin/photos/{id}/approve", app.base_url))
            .bearer_auth(&mod_token)
            .send()
            .await
            .unwrap();
    }

    // Approval made the first photo main; swap to the second
    let response = client
        .put(format!(
            "{}/api/members/photos/{second_id}/main",
            app.base_url
        ))
        .bearer_auth(&lisa)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    // The main photo cannot be deleted
    let response = client
        .delete(format!("{}/api/members/photos/{second_id}", app.base_url))
        .bearer_auth(&lisa)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // A non-main photo can
    let response = client
        .delete(format!("{}/api/members/photos/{first_id}", app.base_url))
        .bearer_auth(&lisa)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    // Someone else's photo reads as not found
    let todd = register(&client, &app.base_url, "todd", "male").await;
    let response = client
        .delete(format!("{}/api/members/photos/{second_id}", app.base_url))
        .bearer_auth(&todd)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
