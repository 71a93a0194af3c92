// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 联系人
///
/// 由补全任务写入，重新补全时整体替换
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub site_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    /// 邮箱可信度 (0-100)
    pub confidence: i32,
    pub created_at: DateTime<FixedOffset>,
}

/// 联系人查找服务返回的候选联系人
#[derive(Debug, Clone, PartialEq)]
pub struct ContactCandidate {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    pub confidence: i32,
}

impl Contact {
    pub fn from_candidate(site_id: Uuid, candidate: ContactCandidate) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id,
            email: candidate.email.to_lowercase(),
            first_name: candidate.first_name,
            last_name: candidate.last_name,
            position: candidate.position,
            confidence: candidate.confidence.clamp(0, 100),
            created_at: Utc::now().into(),
        }
    }
}
