// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::site::Site;
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::site_repository::SiteRepository;
use crate::infrastructure::database::entities::site as site_entity;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use uuid::Uuid;

/// 站点仓库实现
#[derive(Clone)]
pub struct SiteRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl SiteRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<site_entity::Model> for Site {
    fn from(model: site_entity::Model) -> Self {
        Self {
            id: model.id,
            domain: model.domain,
            url: model.url,
            is_wordpress: model.is_wordpress,
            wordpress_confidence: model.wordpress_confidence,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<&Site> for site_entity::ActiveModel {
    fn from(site: &Site) -> Self {
        Self {
            id: Set(site.id),
            domain: Set(site.domain.clone()),
            url: Set(site.url.clone()),
            is_wordpress: Set(site.is_wordpress),
            wordpress_confidence: Set(site.wordpress_confidence),
            created_at: Set(site.created_at),
            updated_at: Set(site.updated_at),
        }
    }
}

#[async_trait]
impl SiteRepository for SiteRepositoryImpl {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Site>, RepositoryError> {
        let model = site_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Site>, RepositoryError> {
        let model = site_entity::Entity::find()
            .filter(site_entity::Column::Domain.eq(domain.to_lowercase()))
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn upsert(&self, site: &Site) -> Result<Site, RepositoryError> {
        let existing = site_entity::Entity::find()
            .filter(site_entity::Column::Domain.eq(site.domain.as_str()))
            .one(self.db.as_ref())
            .await?;

        let saved = match existing {
            // The domain keeps its original id so earlier analyses stay attached
            Some(model) => {
                let mut active: site_entity::ActiveModel = model.into();
                active.url = Set(site.url.clone());
                active.is_wordpress = Set(site.is_wordpress);
                active.wordpress_confidence = Set(site.wordpress_confidence);
                active.updated_at = Set(Utc::now().into());
                active.update(self.db.as_ref()).await?
            }
            None => {
                let active: site_entity::ActiveModel = site.into();
                active.insert(self.db.as_ref()).await?
            }
        };
        Ok(saved.into())
    }
}
