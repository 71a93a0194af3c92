// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 主函数
///
/// 运行 auditrs 数据库迁移命令行（up / down / status）
#[async_std::main]
async fn main() {
    cli::run_cli(migration::Migrator).await;
}
