//! URLs for uploaded media (profile pictures, post images, story media).

#[cfg(test)]
#[path = "media_test.rs"]
mod media_test;

/// Builds absolute media URLs from paths the backend returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaUrls {
    uploads_base_url: String,
}

impl MediaUrls {
    #[must_use]
    pub fn new(uploads_base_url: impl Into<String>) -> Self {
        let base: String = uploads_base_url.into();
        Self { uploads_base_url: base.trim_end_matches('/').to_owned() }
    }

    /// Absolute URL for an upload path such as `profiles/a.jpg`.
    ///
    /// Empty paths yield `None`; paths that are already absolute URLs are
    /// returned unchanged.
    #[must_use]
    pub fn image_url(&self, path: &str) -> Option<String> {
        if path.is_empty() {
            return None;
        }
        if path.starts_with("http") {
            return Some(path.to_owned());
        }
        Some(format!("{}/{}", self.uploads_base_url, path.trim_start_matches('/')))
    }

    #[must_use]
    pub fn profile_picture(&self, filename: &str) -> Option<String> {
        self.prefixed("profiles", filename)
    }

    #[must_use]
    pub fn post_image(&self, filename: &str) -> Option<String> {
        self.prefixed("posts", filename)
    }

    #[must_use]
    pub fn story_media(&self, filename: &str) -> Option<String> {
        self.prefixed("stories", filename)
    }

    fn prefixed(&self, dir: &str, filename: &str) -> Option<String> {
        if filename.is_empty() {
            return None;
        }
        self.image_url(&format!("{dir}/{filename}"))
    }
}

impl From<&crate::config::ClientConfig> for MediaUrls {
    fn from(config: &crate::config::ClientConfig) -> Self {
        Self::new(config.uploads_base_url.clone())
    }
}
