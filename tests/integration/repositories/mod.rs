// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod job_repository_test;
pub mod site_analysis_repository_test;
pub mod site_repository_test;
