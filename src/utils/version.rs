// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::cmp::Ordering;

/// 宽松解析点分版本号，例如 "6.4.2"、"5.9-beta"
///
/// 每段只取开头的数字部分；没有任何数字时返回 None
pub fn parse_version(version: &str) -> Option<Vec<u32>> {
    let parts: Vec<u32> = version
        .trim()
        .trim_start_matches(['v', 'V'])
        .split('.')
        .map_while(|segment| {
            let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .collect();
    (!parts.is_empty()).then_some(parts)
}

/// 比较两个版本号，缺失的段按 0 处理
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    let a = parse_version(a)?;
    let b = parse_version(b)?;
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).copied().unwrap_or(0);
        let right = b.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(Ordering::Equal)
}

/// 主版本与次版本，例如 "6.4.2" → (6, 4)
pub fn major_minor(version: &str) -> Option<(u32, u32)> {
    let parts = parse_version(version)?;
    Some((parts[0], parts.get(1).copied().unwrap_or(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("6.4.2"), Some(vec![6, 4, 2]));
        assert_eq!(parse_version("v5.9-beta1"), Some(vec![5, 9]));
        assert_eq!(parse_version("unknown"), None);
    }

    #[test]
    fn test_compare_versions_pads_missing_segments() {
        assert_eq!(compare_versions("6.4", "6.4.0"), Some(Ordering::Equal));
        assert_eq!(compare_versions("6.4.1", "6.4"), Some(Ordering::Greater));
        assert_eq!(compare_versions("5.10", "5.9.9"), Some(Ordering::Greater));
        assert_eq!(compare_versions("x", "1.0"), None);
    }

    #[test]
    fn test_major_minor() {
        assert_eq!(major_minor("6.4.2"), Some((6, 4)));
        assert_eq!(major_minor("7"), Some((7, 0)));
    }
}
