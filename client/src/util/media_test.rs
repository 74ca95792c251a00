use super::*;
use crate::config::ClientConfig;

fn urls() -> MediaUrls {
    MediaUrls::from(&ClientConfig::default())
}

#[test]
fn relative_path_is_joined_to_uploads_base() {
    assert_eq!(
        urls().image_url("profiles/a.jpg").as_deref(),
        Some("http://localhost:8000/uploads/profiles/a.jpg")
    );
}

#[test]
fn absolute_url_is_returned_unchanged() {
    let cdn = "https://cdn.example.test/p/1.jpg";
    assert_eq!(urls().image_url(cdn).as_deref(), Some(cdn));
}

#[test]
fn empty_inputs_yield_none() {
    assert!(urls().image_url("").is_none());
    assert!(urls().profile_picture("").is_none());
    assert!(urls().story_media("").is_none());
}

#[test]
fn typed_helpers_use_their_directories() {
    let urls = MediaUrls::new("https://media.example.test/");
    assert_eq!(urls.profile_picture("me.png").as_deref(), Some("https://media.example.test/profiles/me.png"));
    assert_eq!(urls.post_image("42.jpg").as_deref(), Some("https://media.example.test/posts/42.jpg"));
    assert_eq!(urls.story_media("s.mp4").as_deref(), Some("https://media.example.test/stories/s.mp4"));
}
