#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};

use fileshare_api::auth::{generate_jwt, Claims};
use fileshare_api::config::AppConfig;
use fileshare_api::database::MemoryStore;
use fileshare_api::storage::MemoryBlobStore;
use fileshare_api::{app, AppState};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const WEBHOOK_SECRET: &str = "integration-webhook-secret";

/// One server per test, each with its own in-memory store
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(tweak: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let mut config = AppConfig::development();
        config.security.jwt_secret = JWT_SECRET.to_string();
        config.security.webhook_secret = WEBHOOK_SECRET.to_string();
        config.blobs.public_base_url = "http://blobs.test/files/".to_string();
        tweak(&mut config);

        let blobs = MemoryBlobStore::new(&config.blobs.public_base_url)?;
        let state = AppState::new(config, Arc::new(MemoryStore::new()), Arc::new(blobs));

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let router = app(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self {
            port,
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self, identifier: &str) -> String {
        generate_jwt(&Claims::new(identifier, None, 1), JWT_SECRET).expect("token")
    }

    pub async fn webhook(&self, event: Value) -> Result<Response> {
        Ok(self
            .client
            .post(self.url("/webhooks/identity"))
            .header("x-webhook-secret", WEBHOOK_SECRET)
            .json(&event)
            .send()
            .await?)
    }

    /// Provisions a user and its memberships through the identity webhook.
    pub async fn provision(&self, identifier: &str, memberships: &[(&str, &str)]) -> Result<()> {
        let resp = self
            .webhook(json!({
                "type": "user.created",
                "data": { "tokenIdentifier": identifier, "name": identifier, "image": "" }
            }))
            .await?;
        anyhow::ensure!(resp.status().is_success(), "user.created failed: {}", resp.status());

        for (org_id, role) in memberships {
            let resp = self
                .webhook(json!({
                    "type": "organizationMembership.created",
                    "data": { "tokenIdentifier": identifier, "orgId": org_id, "role": role }
                }))
                .await?;
            anyhow::ensure!(resp.status().is_success(), "membership failed: {}", resp.status());
        }
        Ok(())
    }

    pub async fn get(&self, identifier: Option<&str>, path: &str) -> Result<Response> {
        let mut req = self.client.get(self.url(path));
        if let Some(id) = identifier {
            req = req.bearer_auth(self.token(id));
        }
        Ok(req.send().await?)
    }

    pub async fn post(&self, identifier: Option<&str>, path: &str, body: Option<Value>) -> Result<Response> {
        let mut req = self.client.post(self.url(path));
        if let Some(id) = identifier {
            req = req.bearer_auth(self.token(id));
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        Ok(req.send().await?)
    }

    pub async fn delete(&self, identifier: Option<&str>, path: &str) -> Result<Response> {
        let mut req = self.client.delete(self.url(path));
        if let Some(id) = identifier {
            req = req.bearer_auth(self.token(id));
        }
        Ok(req.send().await?)
    }

    /// Registers a file through an upload ticket and returns its JSON record.
    pub async fn upload(&self, identifier: &str, org_id: &str, name: &str, file_type: &str) -> Result<Value> {
        let ticket: Value = self.post(Some(identifier), "/api/uploads", None).await?.json().await?;
        let blob_ref = ticket["data"]["blobRef"].clone();

        let resp = self
            .post(
                Some(identifier),
                &format!("/api/orgs/{}/files", org_id),
                Some(json!({ "name": name, "blobRef": blob_ref, "type": file_type })),
            )
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::CREATED, "create_file failed: {}", resp.status());
        let body: Value = resp.json().await?;
        Ok(body["data"].clone())
    }

    pub async fn list_names(&self, identifier: Option<&str>, org_id: &str, query: &str) -> Result<Vec<String>> {
        let body: Value = self
            .get(identifier, &format!("/api/orgs/{}/files{}", org_id, query))
            .await?
            .json()
            .await?;
        Ok(body["data"]
            .as_array()
            .context("data is not an array")?
            .iter()
            .filter_map(|f| f["name"].as_str().map(str::to_string))
            .collect())
    }
}
