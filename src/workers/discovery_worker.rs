// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::models::job::{Job, JobConfig, JobType};
use crate::domain::models::site::Site;
use crate::domain::repositories::site_repository::SiteRepository;
use crate::probes::http::{ensure_success, map_request_error};
use crate::probes::traits::ProbeError;
use crate::probes::wordpress::WordPressDetector;
use crate::utils::url_utils::normalize_site_url;
use crate::workers::handler::{HandlerError, ItemError, JobHandler};

/// 站点发现任务处理器
///
/// 抓取候选站点首页，执行 WordPress 检测，并按域名写入站点记录
pub struct DiscoveryHandler {
    client: Client,
    detector: WordPressDetector,
    sites: Arc<dyn SiteRepository>,
}

impl DiscoveryHandler {
    pub fn new(client: Client, sites: Arc<dyn SiteRepository>) -> Self {
        Self {
            detector: WordPressDetector::new(client.clone()),
            client,
            sites,
        }
    }

    async fn inspect(&self, url: &str) -> Result<Site, ItemError> {
        let site_url = normalize_site_url(url).map_err(|e| ItemError::Validation(e.to_string()))?;

        let response = self
            .client
            .get(&site_url.url)
            .send()
            .await
            .map_err(map_request_error)
            .and_then(ensure_success)
            .map_err(fetch_error)?;
        let headers = response.headers().clone();
        let html = response
            .text()
            .await
            .map_err(|e| fetch_error(map_request_error(e)))?;

        let detection = self
            .detector
            .detect_from_page(&site_url.url, &headers, &html)
            .await;

        Ok(Site::new(site_url.domain, site_url.url).with_wordpress(detection.confidence))
    }
}

fn fetch_error(err: ProbeError) -> ItemError {
    ItemError::Failed(format!("homepage fetch failed: {}", err))
}

#[async_trait]
impl JobHandler for DiscoveryHandler {
    type Item = String;

    fn job_type(&self) -> JobType {
        JobType::Discovery
    }

    fn plan(&self, job: &Job) -> Result<Vec<String>, HandlerError> {
        match &job.config {
            JobConfig::Discovery(config) => Ok(config.urls.clone()),
            _ => Err(HandlerError::ConfigMismatch {
                expected: JobType::Discovery,
            }),
        }
    }

    #[instrument(skip(self, cancel), fields(job_id = %job_id))]
    async fn process(
        &self,
        job_id: Uuid,
        url: &String,
        cancel: &CancellationToken,
    ) -> Result<(), ItemError> {
        let site = tokio::select! {
            _ = cancel.cancelled() => return Err(ItemError::Cancelled),
            site = self.inspect(url) => site?,
        };

        let stored = self
            .sites
            .upsert(&site)
            .await
            .map_err(|e| ItemError::Failed(e.to_string()))?;

        info!(
            site_id = %stored.id,
            domain = %stored.domain,
            wordpress_confidence = stored.wordpress_confidence,
            "Site discovered"
        );
        Ok(())
    }
}
