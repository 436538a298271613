use md5::{Digest, Md5};
use url::form_urlencoded;

pub const DEFAULT_GRAVATAR_BASE_URI: &str = "http://www.gravatar.com";

/// Hex encoded md5 of the lowercased email.
///
/// Only ASCII letters are folded and whitespace is kept as given.
pub fn email_hash(email: &str) -> String {
    let normalized = email.to_ascii_lowercase();
    hex::encode(Md5::digest(normalized.as_bytes()))
}

/// What gravatar should serve when nothing is registered for the hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultImage {
    /// Literal `404`, gravatar answers with a 404 status instead of an image
    NotFound,
    Url(String),
}

impl DefaultImage {
    fn query_value(&self) -> String {
        match self {
            DefaultImage::NotFound => "404".to_string(),
            DefaultImage::Url(url) => form_urlencoded::byte_serialize(url.as_bytes()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GravatarUrl {
    base_uri: String,
    hash: String,
    default: DefaultImage,
    size: u32,
    rating: String,
}

impl GravatarUrl {
    pub fn new(base_uri: &str, email: &str, default: DefaultImage, size: u32, rating: &str) -> Self {
        Self {
            base_uri: base_uri.trim_end_matches('/').to_owned(),
            hash: email_hash(email),
            default,
            size,
            rating: rating.to_owned(),
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Form embedded in markup, parameters joined with `&amp;`.
    pub fn to_html(&self) -> String {
        self.render("&amp;")
    }

    /// Form sent over the wire, parameters joined with `&`.
    pub fn to_request_url(&self) -> String {
        self.render("&")
    }

    fn render(&self, separator: &str) -> String {
        format!(
            "{}/avatar/{}?d={}{sep}size={}{sep}r={}",
            self.base_uri,
            self.hash,
            self.default.query_value(),
            self.size,
            self.rating,
            sep = separator
        )
    }
}

/// Wrap an avatar url in a fixed size `<img>` tag.
///
/// Returns `None` when there is no url to render.
pub fn build_avatar_image_markup(url: &str, size: u32) -> Option<String> {
    if url.is_empty() {
        return None;
    }

    let resized = format!("style='height: {size}px; width: {size}px'");

    Some(format!("<img class='avatar' src='{url}' {resized} alt='' />"))
}
