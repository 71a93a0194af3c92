// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use uuid::Uuid;

/// 站点实体
///
/// 探针的只读输入，由发现任务写入
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: Uuid,
    /// 小写主机名，全局唯一
    pub domain: String,
    /// 站点首页地址
    pub url: String,
    /// 是否为 WordPress 站点
    pub is_wordpress: bool,
    /// WordPress 检测置信度 (0/50/80/95)
    pub wordpress_confidence: i32,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl Site {
    pub fn new(domain: impl Into<String>, url: impl Into<String>) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            domain: domain.into().to_lowercase(),
            url: url.into(),
            is_wordpress: false,
            wordpress_confidence: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// 设置 WordPress 检测结果
    pub fn with_wordpress(mut self, confidence: i32) -> Self {
        self.is_wordpress = confidence > 0;
        self.wordpress_confidence = confidence;
        self
    }
}
