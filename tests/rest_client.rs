use std::time::Duration;

use bytes::Bytes;
use httpmock::MockServer;
use pal_api_types::{GroupMemberRequest, GroupRoleValue, PostCreateRequest};
use palsync::application::repos::{
    ApiError, CommentsApi, FilesApi, GroupsApi, PostsApi, UploadFile,
};
use palsync::config::ApiSettings;
use palsync::infra::rest::RestClient;
use serde_json::json;
use url::Url;
use uuid::Uuid;

fn client(server: &MockServer) -> RestClient {
    RestClient::new(&ApiSettings {
        base_url: Url::parse(&format!("{}/api/", server.base_url())).expect("base url"),
        token: Some("secret".to_string()),
        timeout: Duration::from_secs(5),
        avatar_base_url: None,
    })
    .expect("client")
}

#[tokio::test]
async fn list_posts_sends_group_and_cursor() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/api/posts")
                .query_param("groupId", "3")
                .query_param("cursor", "c1")
                .header("authorization", "Bearer secret");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "data": [{
                        "id": 7,
                        "groupId": 3,
                        "userId": "00000000-0000-0000-0000-000000000001",
                        "content": "hello",
                        "createdAt": "2024-05-01T10:00:00Z",
                        "comments": [{"count": 4}]
                    }],
                    "nextCursor": "c2"
                }));
        })
        .await;

    let page = client(&server)
        .list_posts(3, Some("c1"))
        .await
        .expect("page");

    mock.assert_async().await;
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].comments[0].count, 4);
    assert_eq!(page.next_cursor.as_deref(), Some("c2"));
}

#[tokio::test]
async fn create_post_posts_json_body() {
    let server = MockServer::start_async().await;
    let user_id = Uuid::from_u128(1);
    let mock = server
        .mock_async(|when, then| {
            when.method("POST").path("/api/posts").json_body(json!({
                "groupId": 3,
                "userId": user_id,
                "content": "hi",
                "media": ["a/b.png"]
            }));
            then.status(201);
        })
        .await;

    client(&server)
        .create_post(&PostCreateRequest {
            group_id: 3,
            user_id,
            content: "hi".to_string(),
            media: vec!["a/b.png".to_string()],
        })
        .await
        .expect("created");

    mock.assert_async().await;
}

#[tokio::test]
async fn error_payload_message_is_surfaced() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("DELETE").path("/api/comments/42");
            then.status(403)
                .header("content-type", "application/json")
                .json_body(json!({"message": "not your comment"}));
        })
        .await;

    let error = client(&server)
        .delete_comment(42)
        .await
        .expect_err("forbidden");

    assert!(matches!(
        error,
        ApiError::Status { status: 403, ref message } if message == "not your comment"
    ));
}

#[tokio::test]
async fn plain_error_body_is_kept_verbatim() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/categories");
            then.status(502).body("bad gateway");
        })
        .await;

    let error = client(&server)
        .list_categories()
        .await
        .expect_err("gateway error");

    assert!(matches!(
        error,
        ApiError::Status { status: 502, ref message } if message == "bad gateway"
    ));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/api/comments").query_param("postId", "5");
            then.status(200)
                .header("content-type", "application/json")
                .body("{\"data\": 5}");
        })
        .await;

    let error = client(&server)
        .list_comments(5, None)
        .await
        .expect_err("decode failure");

    assert!(matches!(error, ApiError::Decode(_)));
}

#[tokio::test]
async fn add_members_posts_rows() {
    let server = MockServer::start_async().await;
    let member = GroupMemberRequest {
        user_id: Uuid::from_u128(2),
        post_group_id: 9,
        is_accepted: true,
        role: GroupRoleValue::Owner,
    };
    let mock = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/api/group-members")
                .json_body(json!([{
                    "userId": member.user_id,
                    "postGroupId": 9,
                    "isAccepted": true,
                    "role": "owner"
                }]));
            then.status(201);
        })
        .await;

    client(&server)
        .add_members(std::slice::from_ref(&member))
        .await
        .expect("members added");

    mock.assert_async().await;
}

#[tokio::test]
async fn upload_returns_storage_path() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/api/uploads/post-images")
                .header_exists("content-type");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"path": "u1/photo.png"}));
        })
        .await;

    let uploaded = client(&server)
        .upload_post_image(
            Uuid::from_u128(1),
            UploadFile::new("photo.png", Bytes::from_static(b"\x89PNG")),
        )
        .await
        .expect("uploaded");

    mock.assert_async().await;
    assert_eq!(uploaded.path, "u1/photo.png");
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let client = RestClient::new(&ApiSettings {
        base_url: Url::parse("http://127.0.0.1:9/").expect("base url"),
        token: None,
        timeout: Duration::from_secs(2),
        avatar_base_url: None,
    })
    .expect("client");

    let error = client.list_categories().await.expect_err("no server");

    assert!(matches!(error, ApiError::Transport(_)));
}
