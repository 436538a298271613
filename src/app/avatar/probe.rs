use reqwest::StatusCode;

/// Result of asking gravatar whether a hash has an avatar registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found,
    Missing(u16),
    Failed(String),
}

/// Issue a GET for `url` and look at the status line only, the body is never read.
#[tracing::instrument(name = "Probing gravatar", skip_all)]
pub async fn probe_avatar(http_client: &reqwest::Client, url: &str) -> ProbeOutcome {
    match http_client.get(url).send().await {
        Ok(res) if res.status() == StatusCode::OK => ProbeOutcome::Found,
        Ok(res) => ProbeOutcome::Missing(res.status().as_u16()),
        Err(e) => ProbeOutcome::Failed(e.to_string()),
    }
}
