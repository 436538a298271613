use std::{path::PathBuf, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;

pub mod context;
pub mod fallback;
pub mod gravatar_url;
pub mod probe;

use context::RenderContext;
use fallback::{select_random_default, DirImageFolder, ImageFolder, RandomDefault};
use gravatar_url::{
    build_avatar_image_markup, DefaultImage, GravatarUrl, DEFAULT_GRAVATAR_BASE_URI,
};
use probe::{probe_avatar, ProbeOutcome};

const PLUGIN_IMAGES_DIR: &str = "content/plugins/gravatar/images";
const THEMES_DIR: &str = "content/themes";
const DEFAULT_IMAGE: &str = "default_80.png";

/// Everything needed to render one user's avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarRequest {
    pub user_id: i64,
    pub user_name: String,
    pub email: String,
    /// Pixels, 1 ~ 512
    pub size: u32,
    /// g, pg, r or x
    pub rating: String,
}

#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("no avatar has been configured for this render")]
    NotConfigured,

    #[error("no fallback images available")]
    NoFallbackImages,

    #[error("failed to list fallback images")]
    ImageFolder(#[source] std::io::Error),
}

/// Which default gravatar is told to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackMode {
    /// Resolved from the randomization policy, theme and plugin images
    Default,
    /// Gravatar responds 404 when the hash has no avatar
    NotFound,
}

/// Resolves gravatar urls and markup for a site.
///
/// Holds only site wide settings. Anything that lives for one page, the
/// configured request and the random default assignments, is kept in the
/// [`RenderContext`] passed to each call.
#[derive(Debug)]
pub struct AvatarResolver {
    gravatar_base_uri: String,
    base_url: String,
    base_path: PathBuf,
    theme: String,
    policy: RandomDefault,
    images: Arc<dyn ImageFolder>,
    http_client: reqwest::Client,
}

impl AvatarResolver {
    pub fn new(base_url: &str, base_path: impl Into<PathBuf>, theme: &str) -> Self {
        let base_path = base_path.into();
        let images = DirImageFolder::new(base_path.join(PLUGIN_IMAGES_DIR));

        Self {
            gravatar_base_uri: DEFAULT_GRAVATAR_BASE_URI.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            base_path,
            theme: theme.to_string(),
            policy: RandomDefault::Off,
            images: Arc::new(images),
            http_client: reqwest::Client::new(),
        }
    }

    /// Build a resolver out of app config, the probe client gets the configured timeout.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let http_client = probe_client(config.probe_timeout())?;

        Ok(
            Self::new(&config.app_base_url, &config.app_base_path, &config.app_theme)
                .with_policy(config.app_random_default)
                .with_gravatar_base_uri(&config.app_gravatar_base_uri)
                .with_http_client(http_client),
        )
    }

    pub fn with_policy(mut self, policy: RandomDefault) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_gravatar_base_uri(mut self, base_uri: &str) -> Self {
        self.gravatar_base_uri = base_uri.to_string();
        self
    }

    pub fn with_image_folder(mut self, images: Arc<dyn ImageFolder>) -> Self {
        self.images = images;
        self
    }

    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn policy(&self) -> RandomDefault {
        self.policy
    }

    /// Stash the avatar request for this render. Values are taken as given.
    #[tracing::instrument(name = "Configuring avatar", skip_all, fields(user_id = request.user_id))]
    pub fn configure(&self, ctx: &mut RenderContext, request: AvatarRequest) {
        ctx.request = Some(request);
    }

    /// Gravatar url for `email`, ready to be embedded in html.
    #[tracing::instrument(name = "Building avatar url", skip(self, ctx, email))]
    pub fn build_avatar_url(
        &self,
        ctx: &mut RenderContext,
        email: &str,
        size: u32,
        rating: &str,
        mode: FallbackMode,
    ) -> Result<String, AvatarError> {
        Ok(self.gravatar_url(ctx, email, size, rating, mode)?.to_html())
    }

    /// Avatar markup for the configured request.
    pub fn get_avatar(&self, ctx: &mut RenderContext) -> Result<Option<String>, AvatarError> {
        let request = ctx.request.clone().ok_or(AvatarError::NotConfigured)?;

        let url = self.build_avatar_url(
            ctx,
            &request.email,
            request.size,
            &request.rating,
            FallbackMode::Default,
        )?;

        Ok(build_avatar_image_markup(&url, request.size))
    }

    /// Avatar markup for the configured request, only if gravatar has one registered.
    ///
    /// Performs a network round trip, meant for diagnostics. Every failure ends
    /// up as `None`.
    #[tracing::instrument(name = "Testing avatar", skip_all)]
    pub async fn test_avatar(&self, ctx: &mut RenderContext) -> Option<String> {
        let Some(request) = ctx.request.clone() else {
            tracing::warn!("Avatar test requested before configure");
            return None;
        };

        let url = match self.gravatar_url(
            ctx,
            &request.email,
            request.size,
            &request.rating,
            FallbackMode::NotFound,
        ) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Failed to build avatar url: {:?}", e);
                return None;
            }
        };

        match probe_avatar(&self.http_client, &url.to_request_url()).await {
            ProbeOutcome::Found => build_avatar_image_markup(&url.to_html(), request.size),
            ProbeOutcome::Missing(status) => {
                tracing::info!(hash = url.hash(), status, "No gravatar registered");
                None
            }
            ProbeOutcome::Failed(reason) => {
                tracing::warn!(hash = url.hash(), reason = %reason, "Gravatar probe failed");
                None
            }
        }
    }

    fn gravatar_url(
        &self,
        ctx: &mut RenderContext,
        email: &str,
        size: u32,
        rating: &str,
        mode: FallbackMode,
    ) -> Result<GravatarUrl, AvatarError> {
        let default = match mode {
            FallbackMode::NotFound => DefaultImage::NotFound,
            FallbackMode::Default => DefaultImage::Url(self.default_image_url(ctx)?),
        };

        Ok(GravatarUrl::new(
            &self.gravatar_base_uri,
            email,
            default,
            size,
            rating,
        ))
    }

    fn default_image_url(&self, ctx: &mut RenderContext) -> Result<String, AvatarError> {
        // Random images come from the plugin folder
        if self.policy != RandomDefault::Off {
            let user_id = ctx
                .request
                .as_ref()
                .map(|r| r.user_id)
                .ok_or(AvatarError::NotConfigured)?;
            let filename = select_random_default(ctx, user_id, self.policy, self.images.as_ref())?;

            return Ok(format!("{}/{}/{}", self.base_url, PLUGIN_IMAGES_DIR, filename));
        }

        // A theme can ship its own default before the plugin one is used
        let theme_images = format!("{}/{}/images", THEMES_DIR, self.theme);
        if self.theme_default_exists(&theme_images) {
            return Ok(format!("{}/{}/{}", self.base_url, theme_images, DEFAULT_IMAGE));
        }

        Ok(format!(
            "{}/{}/{}",
            self.base_url, PLUGIN_IMAGES_DIR, DEFAULT_IMAGE
        ))
    }

    fn theme_default_exists(&self, theme_images: &str) -> bool {
        self.base_path
            .join(theme_images)
            .join(DEFAULT_IMAGE)
            .is_file()
    }
}

fn probe_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()?;

    Ok(client)
}
