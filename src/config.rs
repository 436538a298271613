use std::{path::PathBuf, time::Duration};

use crate::app::avatar::fallback::RandomDefault;

#[derive(clap::Parser, Debug, Clone)]
pub struct AppConfig {
    #[clap(long, env)]
    pub stage: Stage,

    // App configs
    #[clap(long, env, default_value_t = 8000)]
    pub app_application_port: u16,

    #[clap(long, env, default_value = "127.0.0.1")]
    pub app_application_host: String,

    // Site layout
    /// Public root URL of the site, e.g. `https://example.com/`
    #[clap(long, env)]
    pub app_base_url: String,

    /// Root directory of the site on disk, `content/` lives under it
    #[clap(long, env)]
    pub app_base_path: PathBuf,

    #[clap(long, env, default_value = "default")]
    pub app_theme: String,

    // Avatar configs
    #[clap(long, env, value_enum, default_value_t = RandomDefault::Off)]
    pub app_random_default: RandomDefault,

    #[clap(long, env, default_value = "http://www.gravatar.com")]
    pub app_gravatar_base_uri: String,

    #[clap(long, env, default_value_t = 3000)]
    pub app_probe_timeout_ms: u64,
}

impl AppConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.app_probe_timeout_ms)
    }
}

#[derive(clap::ValueEnum, Debug, Clone)]
#[clap(rename_all = "kebab_case")]
pub enum Stage {
    Dev,
    Prod,
}
