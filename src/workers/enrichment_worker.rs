// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::models::contact::Contact;
use crate::domain::models::job::{Job, JobConfig, JobType};
use crate::domain::repositories::contact_repository::ContactRepository;
use crate::domain::repositories::site_repository::SiteRepository;
use crate::domain::services::contact_finder::ContactFinder;
use crate::workers::handler::{HandlerError, ItemError, JobHandler};

/// 联系人补全任务处理器
pub struct EnrichmentHandler {
    sites: Arc<dyn SiteRepository>,
    contacts: Arc<dyn ContactRepository>,
    finder: Arc<dyn ContactFinder>,
}

impl EnrichmentHandler {
    pub fn new(
        sites: Arc<dyn SiteRepository>,
        contacts: Arc<dyn ContactRepository>,
        finder: Arc<dyn ContactFinder>,
    ) -> Self {
        Self {
            sites,
            contacts,
            finder,
        }
    }
}

#[async_trait]
impl JobHandler for EnrichmentHandler {
    type Item = Uuid;

    fn job_type(&self) -> JobType {
        JobType::Enrichment
    }

    fn plan(&self, job: &Job) -> Result<Vec<Uuid>, HandlerError> {
        match &job.config {
            JobConfig::Enrichment(_) => Ok(job.config.site_ids()),
            _ => Err(HandlerError::ConfigMismatch {
                expected: JobType::Enrichment,
            }),
        }
    }

    #[instrument(skip(self, cancel), fields(job_id = %job_id, site_id = %site_id))]
    async fn process(
        &self,
        job_id: Uuid,
        site_id: &Uuid,
        cancel: &CancellationToken,
    ) -> Result<(), ItemError> {
        let site = self
            .sites
            .find_by_id(*site_id)
            .await
            .map_err(|e| ItemError::Failed(e.to_string()))?
            .ok_or_else(|| ItemError::Validation(format!("Site {} not found", site_id)))?;

        let candidates = tokio::select! {
            _ = cancel.cancelled() => return Err(ItemError::Cancelled),
            result = self.finder.find_contacts(&site.domain) => result,
        }
        .map_err(|e| {
            if e.is_rate_limited() {
                ItemError::RateLimited(self.finder.name().to_string())
            } else {
                ItemError::Failed(e.to_string())
            }
        })?;

        let contacts: Vec<Contact> = candidates
            .into_iter()
            .map(|candidate| Contact::from_candidate(site.id, candidate))
            .collect();
        self.contacts
            .replace_for_site(site.id, &contacts)
            .await
            .map_err(|e| ItemError::Failed(e.to_string()))?;

        info!(contacts = contacts.len(), "Site enriched");
        Ok(())
    }
}
