use clap::Parser;
use fake::{
    faker::internet::en::{SafeEmail, Username},
    Fake,
};
use gravatar::{
    app::{
        avatar::{fallback::RandomDefault, gravatar_url::email_hash},
        Application,
    },
    config::AppConfig,
    telemetry::{build_telemetry, register_telemetry},
};
use rand::Rng;
use std::sync::LazyLock;
use tempfile::TempDir;
use wiremock::MockServer;

pub const BASE_URL: &str = "http://site.test/";
pub const PLUGIN_IMAGES: &str = "content/plugins/gravatar/images";
pub const THEME_IMAGES: &str = "content/themes/default/images";
pub const RANDOM_AVATARS: [&str; 6] = [
    "default_80.png",
    "blue_80.png",
    "green_80.png",
    "orange_80.png",
    "purple_80.png",
    "red_80.png",
];

static TELEMETRY: LazyLock<()> = LazyLock::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let telemetry = build_telemetry(subscriber_name, default_filter_level, std::io::stdout);
        register_telemetry(telemetry);
    } else {
        let null_telemetry = build_telemetry(subscriber_name, default_filter_level, std::io::sink);
        register_telemetry(null_telemetry);
    };
});

pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub gravatar_server: MockServer,
    pub test_user: TestUser,

    // Dropping it removes the site from disk
    _site: TempDir,
}

impl TestApp {
    pub async fn get_avatar(&self, path: &str, query: &[(&str, String)]) -> reqwest::Response {
        self.api_client
            .get(&format!("{}{}", &self.address, path))
            .query(query)
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn post_page<Body>(&self, body: &Body) -> reqwest::Response
    where
        Body: serde::Serialize,
    {
        self.api_client
            .post(&format!("{}/avatar/page", &self.address))
            .json(body)
            .send()
            .await
            .expect("failed to execute request")
    }

    /// Gravatar url of `email` as it appears in markup.
    pub fn expected_url(&self, email: &str, encoded_default: &str, size: u32, rating: &str) -> String {
        format!(
            "{}/avatar/{}?d={}&amp;size={}&amp;r={}",
            self.gravatar_server.uri(),
            email_hash(email),
            encoded_default,
            size,
            rating
        )
    }
}

pub struct TestUser {
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

impl TestUser {
    pub fn generate() -> Self {
        TestUser {
            user_id: rand::thread_rng().gen_range(1..1_000_000),
            username: Username().fake(),
            email: SafeEmail().fake(),
        }
    }

    pub fn query(&self, size: u32, rating: &str) -> Vec<(&'static str, String)> {
        vec![
            ("user_id", self.user_id.to_string()),
            ("user_name", self.username.clone()),
            ("email", self.email.clone()),
            ("size", size.to_string()),
            ("rating", rating.to_string()),
        ]
    }

    pub fn json(&self, size: u32, rating: &str) -> serde_json::Value {
        serde_json::json!({
            "user_id": self.user_id,
            "user_name": self.username,
            "email": self.email,
            "size": size,
            "rating": rating
        })
    }
}

/// How the site on disk is laid out for a test.
pub struct TestSite {
    pub policy: RandomDefault,
    pub theme_default: bool,
    pub plugin_images: bool,
}

impl Default for TestSite {
    fn default() -> Self {
        Self {
            policy: RandomDefault::Off,
            theme_default: false,
            plugin_images: true,
        }
    }
}

impl TestSite {
    fn build(&self) -> TempDir {
        let site = tempfile::tempdir().expect("failed to create site dir");

        let plugin_images = site.path().join(PLUGIN_IMAGES);
        std::fs::create_dir_all(&plugin_images).expect("failed to create plugin images");
        if self.plugin_images {
            for name in RANDOM_AVATARS {
                std::fs::write(plugin_images.join(name), b"png").expect("failed to write image");
            }
        }

        if self.theme_default {
            let theme_images = site.path().join(THEME_IMAGES);
            std::fs::create_dir_all(&theme_images).expect("failed to create theme images");
            std::fs::write(theme_images.join("default_80.png"), b"png")
                .expect("failed to write image");
        }

        site
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(TestSite::default()).await
}

pub async fn spawn_app_with(test_site: TestSite) -> TestApp {
    LazyLock::force(&TELEMETRY);

    let gravatar_server = MockServer::start().await;
    let site = test_site.build();

    let policy = match test_site.policy {
        RandomDefault::Off => "off",
        RandomDefault::Normal => "normal",
        RandomDefault::Extreme => "extreme",
    };

    // Use a random OS port and point gravatar at the mock
    let app_config = AppConfig::parse_from([
        "gravatar".to_string(),
        "--stage=dev".to_string(),
        "--app-application-host=127.0.0.1".to_string(),
        "--app-application-port=0".to_string(),
        format!("--app-base-url={}", BASE_URL),
        format!("--app-base-path={}", site.path().display()),
        "--app-theme=default".to_string(),
        format!("--app-random-default={}", policy),
        format!("--app-gravatar-base-uri={}", gravatar_server.uri()),
        "--app-probe-timeout-ms=500".to_string(),
    ]);

    let api_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let app = Application::build(app_config).await.unwrap();

    let test_app = TestApp {
        address: format!("http://localhost:{}", &app.port),
        api_client,
        gravatar_server,
        test_user: TestUser::generate(),
        _site: site,
    };

    _ = tokio::spawn(app.run_until_stopped());

    test_app
}
