//! Calendar acquisition: local file or HTTP(S) URL.

use anyhow::{Context, Result, bail};

const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Read calendar text from `input`, downloading it when it is a URL.
pub async fn read(input: &str) -> Result<String> {
    if is_url(input) {
        fetch(input).await
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Could not read {}", input))
    }
}

fn is_url(input: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        input
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(format!("onoff/{}", CURRENT_VERSION))
        .build()?)
}

async fn fetch(url: &str) -> Result<String> {
    let client = http_client()?;
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Could not download {}", url))?;

    tracing::debug!(status = %response.status(), url, "Fetched calendar");

    if !response.status().is_success() {
        bail!("Could not download {} (HTTP {})", url, response.status());
    }

    Ok(response.text().await?)
}
