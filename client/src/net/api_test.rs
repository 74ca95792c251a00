use super::*;
use crate::net::request::{Method, RequestBody};
use crate::net::types::Credentials;
use crate::state::tokens::TokenStore;
use crate::test_helpers::MockTransport;
use crate::util::redirect::MemoryNavigator;

fn api_with(transport: Arc<MockTransport>) -> Api {
    let tokens = TokenStore::in_memory();
    tokens.save(&Credentials::new("T1", Some("R1".into()))).unwrap();
    Api::new(Arc::new(AuthPipeline::new(transport, tokens, Arc::new(MemoryNavigator::default()), "/login")))
}

fn echo() -> Arc<MockTransport> {
    MockTransport::new(|_| Ok(ApiResponse::new(200, "{}")))
}

fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
}

fn png() -> Upload {
    Upload { file_name: "cat.png".into(), mime: "image/png".into(), bytes: vec![0x89, 0x50] }
}

#[tokio::test]
async fn feed_paging_goes_in_query() {
    let transport = echo();
    let api = api_with(transport.clone());

    api.posts(40, DEFAULT_PAGE_LIMIT).await.unwrap();
    api.following_posts(0, 10).await.unwrap();

    let sent = transport.requests();
    assert_eq!(sent[0].method, Method::Get);
    assert_eq!(sent[0].path, "/posts/");
    assert_eq!(sent[0].query, query(&[("skip", "40"), ("limit", "20")]));
    assert_eq!(sent[1].path, "/posts/following");
    assert_eq!(sent[1].query, query(&[("skip", "0"), ("limit", "10")]));
}

#[tokio::test]
async fn resource_calls_carry_bearer() {
    let transport = echo();
    let api = api_with(transport.clone());

    api.user_by_username("alice").await.unwrap();

    let sent = &transport.requests()[0];
    assert_eq!(sent.path, "/users/username/alice");
    assert_eq!(sent.authorization().as_deref(), Some("Bearer T1"));
}

#[tokio::test]
async fn comment_reply_sends_parent_id() {
    let transport = echo();
    let api = api_with(transport.clone());

    api.create_comment(7, "nice", Some(3)).await.unwrap();
    api.create_comment(7, "top level", None).await.unwrap();

    let sent = transport.requests();
    assert_eq!(sent[0].path, "/social/comments");
    assert_eq!(sent[0].body, RequestBody::Json(json!({ "post_id": 7, "text": "nice", "parent_id": 3 })));
    assert_eq!(sent[1].body, RequestBody::Json(json!({ "post_id": 7, "text": "top level", "parent_id": null })));
}

#[tokio::test]
async fn create_post_skips_blank_optional_fields() {
    let transport = echo();
    let api = api_with(transport.clone());

    api.create_post(Some(""), png(), Some("cats,sun")).await.unwrap();

    let RequestBody::Multipart(parts) = &transport.requests()[0].body else {
        panic!("expected multipart body");
    };
    assert_eq!(parts.len(), 2);
    assert!(matches!(&parts[0], Part::File { name, .. } if name == "image"));
    assert_eq!(parts[1], Part::Text { name: "tags".into(), value: "cats,sun".into() });
}

#[tokio::test]
async fn story_upload_uses_file_field() {
    let transport = echo();
    let api = api_with(transport.clone());

    api.create_story(png(), Some("beach")).await.unwrap();

    let RequestBody::Multipart(parts) = &transport.requests()[0].body else {
        panic!("expected multipart body");
    };
    assert!(matches!(&parts[0], Part::File { name, file_name, .. } if name == "file" && file_name == "cat.png"));
}

#[tokio::test]
async fn follow_and_like_send_ids_as_json() {
    let transport = echo();
    let api = api_with(transport.clone());

    api.follow(42).await.unwrap();
    api.like_post(9).await.unwrap();

    let sent = transport.requests();
    assert_eq!(sent[0].body, RequestBody::Json(json!({ "following_id": 42 })));
    assert_eq!(sent[1].body, RequestBody::Json(json!({ "post_id": 9 })));
}

#[tokio::test]
async fn deletes_accept_empty_bodies() {
    let transport = MockTransport::new(|_| Ok(ApiResponse::new(204, "")));
    let api = api_with(transport.clone());

    api.unfollow(42).await.unwrap();
    api.clear_notifications().await.unwrap();

    let sent = transport.requests();
    assert_eq!(sent[0].method, Method::Delete);
    assert_eq!(sent[0].path, "/social/follows/42");
    assert_eq!(sent[1].path, "/notifications/clear-all");
}

#[tokio::test]
async fn unread_count_decodes_count_field() {
    let transport = MockTransport::new(|_| Ok(ApiResponse::new(200, r#"{"count":4}"#)));
    let api = api_with(transport.clone());

    assert_eq!(api.unread_count().await.unwrap(), 4);
    assert_eq!(transport.requests()[0].path, "/notifications/unread/count");
}

#[tokio::test]
async fn forbidden_and_missing_are_surfaced_to_callers() {
    let transport = MockTransport::new(|req| match req.method {
        Method::Delete => Ok(ApiResponse::new(403, r#"{"detail":"Not your post"}"#)),
        _ => Ok(ApiResponse::new(404, r#"{"detail":"Post not found"}"#)),
    });
    let api = api_with(transport);

    let denied = api.delete_post("5").await.unwrap_err();
    let missing = api.post("5").await.unwrap_err();

    assert!(matches!(denied, ApiError::Forbidden { ref detail } if detail == "Not your post"));
    assert!(matches!(missing, ApiError::NotFound { ref detail } if detail == "Post not found"));
}

#[tokio::test]
async fn login_decodes_grant() {
    let transport = MockTransport::new(|_| {
        Ok(ApiResponse::new(
            200,
            r#"{"access_token":"T5","refresh_token":"R5","token_type":"bearer","user":{"id":1,"username":"alice"}}"#,
        ))
    });
    let api = api_with(transport.clone());

    let grant = api.login("alice", "correct-pw").await.unwrap();

    assert_eq!(grant.credentials(), Credentials::new("T5", Some("R5".into())));
    assert_eq!(grant.user.username(), Some("alice"));
    assert_eq!(transport.requests()[0].path, LOGIN_ENDPOINT);
}

#[tokio::test]
async fn register_posts_json_fields() {
    let transport = MockTransport::new(|_| {
        Ok(ApiResponse::new(200, r#"{"access_token":"T1","user":{"id":2,"username":"bob"}}"#))
    });
    let api = api_with(transport.clone());
    let fields = RegisterFields {
        username: "bob".into(),
        email: "bob@example.test".into(),
        password: "pw".into(),
        full_name: Some("Bob B".into()),
        ..RegisterFields::default()
    };

    let grant = api.register(&fields).await.unwrap();

    assert_eq!(grant.refresh_token, None);
    let RequestBody::Json(body) = &transport.requests()[0].body else {
        panic!("expected JSON body");
    };
    assert_eq!(body["username"], "bob");
    assert_eq!(body["full_name"], "Bob B");
}

#[tokio::test]
async fn search_limits_results() {
    let transport = echo();
    let api = api_with(transport.clone());

    api.search_users("ali", 5).await.unwrap();

    let sent = &transport.requests()[0];
    assert_eq!(sent.path, "/users/search/ali");
    assert_eq!(sent.query, query(&[("limit", "5")]));
}
