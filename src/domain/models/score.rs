// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::job::DomainError;

/// 评分类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Performance,
    Security,
    Seo,
    Availability,
}

impl Category {
    /// 类别满分
    pub fn max_score(&self) -> i32 {
        match self {
            Category::Performance => 30,
            Category::Security => 30,
            Category::Seo => 20,
            Category::Availability => 20,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Category::Performance => "performance",
            Category::Security => "security",
            Category::Seo => "seo",
            Category::Availability => "availability",
        };
        f.write_str(s)
    }
}

/// 一条扣分记录，构成面向用户的审计日志
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub category: Category,
    pub points: i32,
    pub reason: String,
}

/// 优先级分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// 按健康分划分优先级，每个区间包含上界
    pub fn from_health_score(score: i32) -> Self {
        match score {
            i32::MIN..=40 => Priority::Critical,
            41..=60 => Priority::High,
            61..=75 => Priority::Medium,
            _ => Priority::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(DomainError::ValidationError(format!(
                "unknown priority: {}",
                other
            ))),
        }
    }
}

/// 销售跟进动作分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Qualified,
    ManualReview,
    Maintenance,
}

impl Action {
    pub fn from_health_score(score: i32) -> Self {
        match score {
            i32::MIN..=60 => Action::Qualified,
            61..=75 => Action::ManualReview,
            _ => Action::Maintenance,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Qualified => "qualified",
            Action::ManualReview => "manual_review",
            Action::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qualified" => Ok(Action::Qualified),
            "manual_review" => Ok(Action::ManualReview),
            "maintenance" => Ok(Action::Maintenance),
            other => Err(DomainError::ValidationError(format!(
                "unknown action: {}",
                other
            ))),
        }
    }
}

/// 评分结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCard {
    pub performance_score: i32,
    pub security_score: i32,
    pub seo_score: i32,
    pub availability_score: i32,
    /// 四项子分之和，不单独取整
    pub health_score: i32,
    pub priority: Priority,
    pub action: Action,
    pub deductions: Vec<Deduction>,
}
