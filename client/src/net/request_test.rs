use super::*;
use serde_json::json;

#[test]
fn new_request_carries_no_credentials() {
    let req = ApiRequest::get("/users/me");
    assert!(req.bearer.is_none());
    assert!(req.authorization().is_none());
    assert!(!req.is_retry());
}

#[test]
fn authorization_formats_bearer_exactly() {
    let mut req = ApiRequest::get("/posts/");
    req.bearer = Some("T1".into());
    assert_eq!(req.authorization().as_deref(), Some("Bearer T1"));
}

#[test]
fn route_strips_query_and_trailing_slash() {
    assert_eq!(ApiRequest::get("/posts/?skip=0").route(), "/posts");
    assert_eq!(ApiRequest::post("/users/login/").route(), "/users/login");
}

#[test]
fn query_pairs_accumulate_in_order() {
    let req = ApiRequest::get("/posts/").query("skip", 20).query("limit", 10);
    assert_eq!(req.query, vec![("skip".into(), "20".into()), ("limit".into(), "10".into())]);
}

#[test]
fn json_body_serializes_payload() {
    let req = ApiRequest::post("/social/likes").json(&json!({"post_id": 3})).unwrap();
    assert_eq!(req.body, RequestBody::Json(json!({"post_id": 3})));
}

#[test]
fn response_json_decodes_success_body() {
    let resp = ApiResponse::new(200, r#"{"count": 4}"#);
    let value: serde_json::Value = resp.json().unwrap();
    assert_eq!(value["count"], 4);
}

#[test]
fn response_json_maps_error_status() {
    let resp = ApiResponse::new(404, r#"{"detail":"Post not found"}"#);
    let err = resp.json::<serde_json::Value>().unwrap_err();
    assert!(matches!(err, ApiError::NotFound { ref detail } if detail == "Post not found"));
}

#[test]
fn response_json_reports_decode_failures() {
    let err = ApiResponse::new(200, "not json").json::<serde_json::Value>().unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[test]
fn empty_accepts_no_content() {
    assert!(ApiResponse::new(204, "").empty().is_ok());
}
