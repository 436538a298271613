use std::collections::HashMap;

use rand::{rngs::StdRng, SeedableRng};

use super::AvatarRequest;

/// Fallback images handed out during one render.
#[derive(Debug, Default)]
pub struct PerPageAvatarCache {
    pub(super) random_avatars: Option<Vec<String>>,
    pub(super) avatar_set: HashMap<i64, String>,
}

impl PerPageAvatarCache {
    pub fn assigned(&self, user_id: i64) -> Option<&str> {
        self.avatar_set.get(&user_id).map(String::as_str)
    }

    pub fn listing(&self) -> Option<&[String]> {
        self.random_avatars.as_deref()
    }
}

/// State shared by every avatar rendered on one page.
///
/// Create one per render and drop it when the render is done, nothing in here
/// outlives the page.
#[derive(Debug)]
pub struct RenderContext {
    pub(super) request: Option<AvatarRequest>,
    pub(super) cache: PerPageAvatarCache,
    pub(super) rng: StdRng,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Seeded context, fallback picks are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            request: None,
            cache: PerPageAvatarCache::default(),
            rng,
        }
    }

    pub fn request(&self) -> Option<&AvatarRequest> {
        self.request.as_ref()
    }

    pub fn cache(&self) -> &PerPageAvatarCache {
        &self.cache
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}
