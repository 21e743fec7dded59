mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};
use serde_json::json;

async fn create_item(app: &TestApp, token: &str, name: &str, category: Option<&str>) -> String {
    let res = app
        .post_json_auth(
            "/items",
            token,
            json!({ "name": name, "description": "", "category": category }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = body_json(res).await;
    body["item_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_creator_is_granted_atomically_with_creation() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register_and_login("alice", "correct horse battery").await;

    let item_id = create_item(&app, &token, "Office router", None).await;

    // The creator can read it back immediately
    let res = app.get_auth(&format!("/items/{}", item_id), &token).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.get_auth("/items", &token).await;
    let body = body_json(res).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_principal_is_forbidden() {
    let app = TestApp::spawn().await;
    let (_, alice) = app.register_and_login("alice", "correct horse battery").await;
    let (_, bob) = app.register_and_login("bob", "another long password").await;

    let item_id = create_item(&app, &alice, "Office router", None).await;

    for res in [
        app.get_auth(&format!("/items/{}", item_id), &bob).await,
        app.put_json_auth(&format!("/items/{}", item_id), &bob, json!({ "name": "x" }))
            .await,
        app.delete_auth(&format!("/items/{}", item_id), &bob).await,
    ] {
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body = body_json(res).await;
        assert_eq!(body["error"], "You don't have access to this resource");
    }

    // And the item does not show up in bob's listing
    let res = app.get_auth("/items", &bob).await;
    let body = body_json(res).await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_grant_then_revoke_flips_access() {
    let app = TestApp::spawn().await;
    let (_, alice) = app.register_and_login("alice", "correct horse battery").await;
    let (bob_id, bob) = app.register_and_login("bob", "another long password").await;

    let item_id = create_item(&app, &alice, "Office router", None).await;

    let res = app
        .post_json_auth(
            &format!("/items/{}/principals", item_id),
            &alice,
            json!({ "username": "bob" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.get_auth(&format!("/items/{}", item_id), &bob).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .delete_auth(&format!("/items/{}/principals/{}", item_id, bob_id), &alice)
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.get_auth(&format!("/items/{}", item_id), &bob).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_revoking_the_last_principal_is_refused() {
    let app = TestApp::spawn().await;
    let (alice_id, alice) = app.register_and_login("alice", "correct horse battery").await;

    let item_id = create_item(&app, &alice, "Office router", None).await;

    let res = app
        .delete_auth(&format!("/items/{}/principals/{}", item_id, alice_id), &alice)
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // The refusal left the item reachable
    let res = app.get_auth(&format!("/items/{}", item_id), &alice).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_granting_requires_access() {
    let app = TestApp::spawn().await;
    let (_, alice) = app.register_and_login("alice", "correct horse battery").await;
    let (_, bob) = app.register_and_login("bob", "another long password").await;
    app.register_and_login("carol", "a third long password").await;

    let item_id = create_item(&app, &alice, "Office router", None).await;

    // bob is not a principal; he cannot hand out access either
    let res = app
        .post_json_auth(
            &format!("/items/{}/principals", item_id),
            &bob,
            json!({ "username": "carol" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_category_filter_on_listing() {
    let app = TestApp::spawn().await;
    let (_, alice) = app.register_and_login("alice", "correct horse battery").await;

    create_item(&app, &alice, "Office router", Some("network")).await;
    create_item(&app, &alice, "Payroll db", Some("database")).await;

    let res = app.get_auth("/items?category=network", &alice).await;
    let body = body_json(res).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Office router");

    let res = app.get_auth("/items", &alice).await;
    let body = body_json(res).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_and_delete_as_principal() {
    let app = TestApp::spawn().await;
    let (_, alice) = app.register_and_login("alice", "correct horse battery").await;

    let item_id = create_item(&app, &alice, "Office router", None).await;

    let res = app
        .put_json_auth(
            &format!("/items/{}", item_id),
            &alice,
            json!({ "name": "Core router", "category": "network" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.get_auth(&format!("/items/{}", item_id), &alice).await;
    let body = body_json(res).await;
    assert_eq!(body["name"], "Core router");
    assert_eq!(body["category"], "network");

    let res = app.delete_auth(&format!("/items/{}", item_id), &alice).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.get_auth(&format!("/items/{}", item_id), &alice).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_item_is_not_found() {
    let app = TestApp::spawn().await;
    let (_, alice) = app.register_and_login("alice", "correct horse battery").await;

    let res = app
        .get_auth(
            "/items/00000000-0000-0000-0000-000000000000",
            &alice,
        )
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
