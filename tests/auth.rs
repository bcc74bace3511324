pub mod common;

use reqwest::StatusCode;
use serde_json::json;
use shiftboard::db::user::Role;

#[tokio::test]
async fn login_returns_a_token_and_identity() {
    let server = common::spawn().await;
    let id = common::seed_user(
        &server,
        "Ivan Manager",
        "manager",
        "password123",
        Role::Manager,
    )
    .await;

    let (client, login) = common::Client::new(&server)
        .login("manager", "password123")
        .await
        .expect("login failed");

    assert!(!login.token.is_empty());
    assert_eq!(login.user.id, id);
    assert_eq!(login.user.role, Role::Manager);

    let me = client.me().await.expect("failed to get the identity");
    assert_eq!(me.id, id);
    assert_eq!(me.username, "manager");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let server = common::spawn().await;
    common::seed_user(&server, "Ivan Manager", "manager", "p", Role::Manager)
        .await;

    let Err(status) =
        common::Client::new(&server).login("manager", "wrong").await
    else {
        panic!("login unexpectedly succeeded");
    };

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_username_is_unauthorized() {
    let server = common::spawn().await;

    let Err(status) =
        common::Client::new(&server).login("nobody", "p").await
    else {
        panic!("login unexpectedly succeeded");
    };

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn identity_endpoint_requires_a_token() {
    let server = common::spawn().await;

    let client = common::Client::new(&server);
    assert_eq!(client.me().await.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_with_missing_fields_is_bad_request() {
    let server = common::spawn().await;
    common::seed_user(&server, "Ivan Manager", "manager", "p", Role::Manager)
        .await;

    let client = common::Client::new(&server);
    let status = client.login_raw(&json!({ "username": "manager" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
