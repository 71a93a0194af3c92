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

use crate::domain::models::contact::Contact;
use crate::domain::repositories::contact_repository::ContactRepository;
use crate::domain::repositories::job_repository::RepositoryError;
use crate::infrastructure::database::entities::contact as contact_entity;
use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

/// 联系人仓库实现
#[derive(Clone)]
pub struct ContactRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl ContactRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<contact_entity::Model> for Contact {
    fn from(model: contact_entity::Model) -> Self {
        Self {
            id: model.id,
            site_id: model.site_id,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            position: model.position,
            confidence: model.confidence.unwrap_or(0),
            created_at: model.created_at,
        }
    }
}

impl From<&Contact> for contact_entity::ActiveModel {
    fn from(contact: &Contact) -> Self {
        Self {
            id: Set(contact.id),
            site_id: Set(contact.site_id),
            email: Set(contact.email.clone()),
            first_name: Set(contact.first_name.clone()),
            last_name: Set(contact.last_name.clone()),
            position: Set(contact.position.clone()),
            confidence: Set(Some(contact.confidence)),
            created_at: Set(contact.created_at),
        }
    }
}

#[async_trait]
impl ContactRepository for ContactRepositoryImpl {
    async fn replace_for_site(
        &self,
        site_id: Uuid,
        contacts: &[Contact],
    ) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;

        contact_entity::Entity::delete_many()
            .filter(contact_entity::Column::SiteId.eq(site_id))
            .exec(&txn)
            .await?;

        if !contacts.is_empty() {
            let models: Vec<contact_entity::ActiveModel> =
                contacts.iter().map(Into::into).collect();
            contact_entity::Entity::insert_many(models)
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn find_by_site(&self, site_id: Uuid) -> Result<Vec<Contact>, RepositoryError> {
        let models = contact_entity::Entity::find()
            .filter(contact_entity::Column::SiteId.eq(site_id))
            .order_by_desc(contact_entity::Column::Confidence)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }
}
