// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "site_analyses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub site_id: Uuid,
    pub analysis_job_id: Uuid,
    pub status: String,
    pub pagespeed: Option<Json>,
    pub tls: Option<Json>,
    pub wordpress: Option<Json>,
    pub vulnerabilities: Option<Json>,
    pub security_headers: Option<Json>,
    pub availability: Option<Json>,
    pub health_score: Option<i32>,
    pub security_score: Option<i32>,
    pub performance_score: Option<i32>,
    pub seo_score: Option<i32>,
    pub availability_score: Option<i32>,
    pub priority_classification: Option<String>,
    pub action_classification: Option<String>,
    pub deductions: Option<Json>,
    pub error: Option<String>,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub analyzed_at: Option<ChronoDateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
