use anyhow::{bail, Context};
use serde_json::{json, Value};
use url::Url;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

pub async fn check(base: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let base_url = Url::parse(base).context("invalid base URL")?;
    let health_url = base_url.join("/health")?;

    let response = reqwest::Client::new()
        .get(health_url.clone())
        .send()
        .await
        .with_context(|| format!("failed to reach {}", health_url))?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        bail!("{} reported {}: {}", health_url, status, body);
    }

    output_success(
        &output_format,
        &format!("{} is healthy", base_url),
        Some(json!({ "health": body.get("data").cloned().unwrap_or(Value::Null) })),
    )
}
