// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::settings::HunterSettings;
use crate::domain::models::contact::ContactCandidate;
use crate::domain::services::contact_finder::ContactFinder;
use crate::probes::http::{ensure_success, map_request_error, provider_limiter, ProviderLimiter};
use crate::probes::traits::ProbeError;

#[derive(Debug, Deserialize)]
struct DomainSearchResponse {
    data: DomainSearchData,
}

#[derive(Debug, Deserialize)]
struct DomainSearchData {
    #[serde(default)]
    emails: Vec<HunterEmail>,
}

#[derive(Debug, Deserialize)]
struct HunterEmail {
    value: String,
    first_name: Option<String>,
    last_name: Option<String>,
    position: Option<String>,
    #[serde(default)]
    confidence: i32,
}

impl From<HunterEmail> for ContactCandidate {
    fn from(email: HunterEmail) -> Self {
        Self {
            email: email.value,
            first_name: email.first_name,
            last_name: email.last_name,
            position: email.position,
            confidence: email.confidence,
        }
    }
}

/// Hunter.io `domain-search` 客户端
pub struct HunterClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    limiter: Arc<ProviderLimiter>,
}

impl HunterClient {
    pub fn new(client: Client, settings: &HunterSettings) -> Self {
        Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            limiter: provider_limiter(settings.requests_per_minute),
        }
    }
}

#[async_trait]
impl ContactFinder for HunterClient {
    async fn find_contacts(&self, domain: &str) -> Result<Vec<ContactCandidate>, ProbeError> {
        let mut query = vec![("domain", domain.to_string())];
        if let Some(key) = &self.api_key {
            query.push(("api_key", key.clone()));
        }

        self.limiter.until_ready().await;
        let response = self
            .client
            .get(format!("{}/domain-search", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(map_request_error)?;
        let body: DomainSearchResponse = ensure_success(response)?
            .json()
            .await
            .map_err(|e| ProbeError::Parse(e.to_string()))?;

        debug!("Hunter returned {} emails for {}", body.data.emails.len(), domain);
        Ok(body.data.emails.into_iter().map(Into::into).collect())
    }

    fn name(&self) -> &'static str {
        "hunter"
    }
}
