// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::job_repository::RepositoryError;
use crate::domain::models::contact::Contact;
use async_trait::async_trait;
use uuid::Uuid;

/// 联系人仓库特质
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// 用新的联系人列表替换站点已有联系人
    async fn replace_for_site(
        &self,
        site_id: Uuid,
        contacts: &[Contact],
    ) -> Result<(), RepositoryError>;
    /// 站点的全部联系人
    async fn find_by_site(&self, site_id: Uuid) -> Result<Vec<Contact>, RepositoryError>;
}
