//! Integration tests for the REST messaging path: send, history, conversation
//! listing, mark-read, unread counts, and the validation/authorization rejections.

use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Helper: start the server on a random port and return its base URL.
async fn start_test_server() -> String {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = healthhub_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = healthhub_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = healthhub_server::state::AppState {
        db,
        jwt_secret,
        connections: healthhub_server::ws::new_connection_registry(),
    };

    let app = healthhub_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    format!("http://{}", addr)
}

/// Register a participant and return (token, participant_id).
async fn register(base_url: &str, username: &str, role: &str) -> (String, String) {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/auth/register", base_url))
        .json(&json!({ "username": username, "role": role }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201, "registration failed for {}", username);
    let body: Value = resp.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    let id = body["participant"]["_id"].as_str().unwrap().to_string();
    (token, id)
}

/// Assign a case manager to a user via the admin endpoint.
async fn assign(base_url: &str, admin_token: &str, user_id: &str, cm_id: &str) {
    let client = reqwest::Client::new();
    let resp = client
        .put(format!("{}/admin/assign", base_url))
        .bearer_auth(admin_token)
        .json(&json!({ "userId": user_id, "caseManagerId": cm_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "assignment failed");
}

/// Standard fixture: an admin, a case manager, and a user assigned to them.
async fn setup_pair(base_url: &str) -> (String, String, String, String) {
    let (admin_token, _) = register(base_url, "admin", "admin").await;
    let (cm_token, cm_id) = register(base_url, "manager", "case_manager").await;
    let (user_token, user_id) = register(base_url, "anon_heron", "user").await;
    assign(base_url, &admin_token, &user_id, &cm_id).await;
    (user_token, user_id, cm_token, cm_id)
}

#[tokio::test]
async fn offline_send_surfaces_in_listing_and_unread_count() {
    let base_url = start_test_server().await;
    let (user_token, user_id, cm_token, cm_id) = setup_pair(&base_url).await;
    let client = reqwest::Client::new();

    // Case manager has no live connection: send still succeeds
    let resp = client
        .post(format!("{}/messages/send", base_url))
        .bearer_auth(&user_token)
        .json(&json!({ "receiverId": cm_id, "text": "Hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"]["text"], "Hello");
    assert_eq!(body["message"]["isFromCaseManager"], false);
    assert_eq!(body["message"]["read"], false);

    // The receiver's unread total reflects the message
    let resp = client
        .get(format!("{}/messages/unread-count", base_url))
        .bearer_auth(&cm_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["unreadCount"], 1);

    // Sender's own unread state is unaffected
    let resp = client
        .get(format!("{}/messages/unread-count", base_url))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["unreadCount"], 0);

    // The conversation listing shows the preview and per-side unread count
    let resp = client
        .get(format!("{}/messages/conversations", base_url))
        .bearer_auth(&cm_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let conversations = body["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["userId"]["_id"], user_id.as_str());
    assert_eq!(conversations[0]["lastMessage"], "Hello");
    assert_eq!(conversations[0]["unreadCount"]["caseManager"], 1);
}

#[tokio::test]
async fn history_is_shared_ordered_and_append_only() {
    let base_url = start_test_server().await;
    let (user_token, _user_id, cm_token, cm_id) = setup_pair(&base_url).await;
    let client = reqwest::Client::new();

    for text in ["one", "two", "three"] {
        let resp = client
            .post(format!("{}/messages/send", base_url))
            .bearer_auth(&user_token)
            .json(&json!({ "receiverId": cm_id, "text": text }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    // User view: no query parameter, resolves to the assigned case manager
    let resp = client
        .get(format!("{}/messages/conversation", base_url))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["text"], "one");
    assert_eq!(messages[2]["text"], "three");

    // Case-manager reply lands in the same transcript
    let user_id = messages[0]["senderId"].as_str().unwrap().to_string();
    let resp = client
        .post(format!("{}/messages/send", base_url))
        .bearer_auth(&cm_token)
        .json(&json!({ "receiverId": user_id, "text": "noted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"]["isFromCaseManager"], true);

    let resp = client
        .get(format!("{}/messages/conversation?userId={}", base_url, user_id))
        .bearer_auth(&cm_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[3]["text"], "noted");
}

#[tokio::test]
async fn mark_read_is_idempotent() {
    let base_url = start_test_server().await;
    let (user_token, _user_id, cm_token, cm_id) = setup_pair(&base_url).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/messages/send", base_url))
        .bearer_auth(&user_token)
        .json(&json!({ "receiverId": cm_id, "text": "please read" }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let conversation_id = body["message"]["conversationId"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let resp = client
            .put(format!("{}/messages/read", base_url))
            .bearer_auth(&cm_token)
            .json(&json!({ "conversationId": conversation_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        // Count is 0 both times — never negative
        assert_eq!(body["unreadCount"], 0);
    }

    let resp = client
        .get(format!("{}/messages/unread-count", base_url))
        .bearer_auth(&cm_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["unreadCount"], 0);
}

#[tokio::test]
async fn empty_body_is_rejected_before_storage() {
    let base_url = start_test_server().await;
    let (user_token, _user_id, _cm_token, cm_id) = setup_pair(&base_url).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/messages/send", base_url))
        .bearer_auth(&user_token)
        .json(&json!({ "receiverId": cm_id, "text": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);

    // Nothing reached the store
    let resp = client
        .get(format!("{}/messages/conversation", base_url))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["messages"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn unassigned_user_cannot_send() {
    let base_url = start_test_server().await;
    let (_cm_token, cm_id) = register(&base_url, "manager", "case_manager").await;
    let (loner_token, _) = register(&base_url, "anon_loner", "user").await;
    let client = reqwest::Client::new();

    // No assignedCaseManager: send is an authorization failure
    let resp = client
        .post(format!("{}/messages/send", base_url))
        .bearer_auth(&loner_token)
        .json(&json!({ "receiverId": cm_id, "text": "Hello?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // And the thread fetch fails the same way
    let resp = client
        .get(format!("{}/messages/conversation", base_url))
        .bearer_auth(&loner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // No message was created on the case-manager side
    let resp = client
        .get(format!("{}/messages/unread-count", base_url))
        .bearer_auth(&_cm_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["unreadCount"], 0);
}

#[tokio::test]
async fn case_manager_cannot_read_unassigned_threads() {
    let base_url = start_test_server().await;
    let (admin_token, _) = register(&base_url, "admin", "admin").await;
    let (_cm_a_token, cm_a_id) = register(&base_url, "manager_a", "case_manager").await;
    let (cm_b_token, _cm_b_id) = register(&base_url, "manager_b", "case_manager").await;
    let (_user_token, user_id) = register(&base_url, "anon_wren", "user").await;
    assign(&base_url, &admin_token, &user_id, &cm_a_id).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{}/messages/conversation?userId={}", base_url, user_id))
        .bearer_auth(&cm_b_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn user_cannot_list_conversations() {
    let base_url = start_test_server().await;
    let (user_token, _) = register(&base_url, "anon_crane", "user").await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/messages/conversations", base_url))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let base_url = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/messages/unread-count", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}
