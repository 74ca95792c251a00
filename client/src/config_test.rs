use super::*;
use std::collections::HashMap;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn empty_environment_yields_defaults() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(cfg, ClientConfig::default());
    assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
    assert_eq!(cfg.unread_poll_secs, 30);
    assert_eq!(cfg.login_path, "/login");
}

#[test]
fn overrides_are_applied_and_trailing_slashes_trimmed() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[
        ("PHOTOFEED_API_BASE_URL", "https://api.example.test/v1/"),
        ("PHOTOFEED_UPLOADS_BASE_URL", "https://cdn.example.test/uploads//"),
        ("PHOTOFEED_REQUEST_TIMEOUT_SECS", "42"),
        ("PHOTOFEED_CONNECT_TIMEOUT_SECS", " 7 "),
        ("PHOTOFEED_UNREAD_POLL_SECS", "5"),
        ("PHOTOFEED_LOGIN_PATH", "/signin"),
    ]))
    .unwrap();
    assert_eq!(cfg.api_base_url, "https://api.example.test/v1");
    assert_eq!(cfg.uploads_base_url, "https://cdn.example.test/uploads");
    assert_eq!(cfg.request_timeout_secs, 42);
    assert_eq!(cfg.connect_timeout_secs, 7);
    assert_eq!(cfg.unread_poll_secs, 5);
    assert_eq!(cfg.login_path, "/signin");
}

#[test]
fn blank_base_url_falls_back_to_default() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[("PHOTOFEED_API_BASE_URL", "  ")])).unwrap();
    assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
}

#[test]
fn relative_login_path_is_ignored() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[("PHOTOFEED_LOGIN_PATH", "login")])).unwrap();
    assert_eq!(cfg.login_path, DEFAULT_LOGIN_PATH);
}

#[test]
fn invalid_timeout_errors() {
    let err = ClientConfig::from_lookup(lookup_from(&[("PHOTOFEED_REQUEST_TIMEOUT_SECS", "soon")])).unwrap_err();
    assert_eq!(err.key, "PHOTOFEED_REQUEST_TIMEOUT_SECS");
    assert!(err.to_string().contains("config parse failed"));
}

#[test]
fn zero_unread_poll_interval_is_rejected() {
    let err = ClientConfig::from_lookup(lookup_from(&[("PHOTOFEED_UNREAD_POLL_SECS", "0")])).unwrap_err();
    assert_eq!(err.key, "PHOTOFEED_UNREAD_POLL_SECS");
    assert_eq!(err.expected, "positive number of seconds");
}

#[test]
fn endpoint_joins_without_double_slash() {
    let cfg = ClientConfig::default();
    assert_eq!(cfg.endpoint("/users/me"), "http://localhost:8000/api/users/me");
    assert_eq!(cfg.endpoint("posts/"), "http://localhost:8000/api/posts/");
}
