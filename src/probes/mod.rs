// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 探针模块
///
/// 每个探针独立检查站点的一个维度：
/// - 可用性与响应时间（availability），附带 meta description 与站点地图
/// - 安全响应头（security_headers）
/// - TLS 证书（tls）
/// - PageSpeed Insights（pagespeed）
/// - WordPress 检测与指纹（wordpress）
/// - 已知漏洞匹配（vulnerabilities）
pub mod availability;
pub mod http;
pub mod pagespeed;
pub mod security_headers;
pub mod tls;
pub mod traits;
pub mod vulnerabilities;
pub mod wordpress;
