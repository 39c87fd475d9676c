//! Parsing of Redis-style `INFO` replies

use serde::Serialize;
use std::collections::HashMap;

/// Memory section of `INFO`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    pub used_memory: u64,
    pub used_memory_human: String,
    pub used_memory_peak: u64,
    pub used_memory_peak_human: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxmemory: Option<u64>,
}

impl MemoryInfo {
    /// Build from an `INFO memory` reply. `None` when `used_memory` is absent.
    pub fn parse(raw: &str) -> Option<Self> {
        let fields = parse_fields(raw);

        let used_memory = fields.get("used_memory")?.parse::<u64>().ok()?;
        let used_memory_peak = fields
            .get("used_memory_peak")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(used_memory);

        let human = |key: &str, bytes: u64| {
            fields
                .get(key)
                .map(|v| v.to_string())
                .unwrap_or_else(|| format_bytes(bytes as usize))
        };

        Some(Self {
            used_memory_human: human("used_memory_human", used_memory),
            used_memory_peak_human: human("used_memory_peak_human", used_memory_peak),
            used_memory,
            used_memory_peak,
            maxmemory: fields.get("maxmemory").and_then(|v| v.parse().ok()),
        })
    }
}

/// `key:value` lines of an INFO reply. Section headers and blanks are skipped.
pub fn parse_fields(raw: &str) -> HashMap<&str, &str> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .collect()
}

/// Format bytes to human-readable format
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if size.fract() < 0.01 {
        format!("{:.0}{}", size, UNITS[unit])
    } else {
        format!("{:.2}{}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(1024), "1KB");
        assert_eq!(format_bytes(1536), "1.50KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3MB");
    }

    #[test]
    fn test_parse_redis_reply() {
        let raw = "# Memory\r\nused_memory:1048576\r\nused_memory_human:1.00M\r\nused_memory_peak:2097152\r\nused_memory_peak_human:2.00M\r\nmaxmemory:0\r\n";
        let info = MemoryInfo::parse(raw).unwrap();
        assert_eq!(info.used_memory, 1_048_576);
        assert_eq!(info.used_memory_human, "1.00M");
        assert_eq!(info.used_memory_peak, 2_097_152);
        assert_eq!(info.maxmemory, Some(0));
    }

    #[test]
    fn test_missing_human_values_are_rendered() {
        let info = MemoryInfo::parse("used_memory:2048\n").unwrap();
        assert_eq!(info.used_memory_human, "2KB");
        assert_eq!(info.used_memory_peak, 2048);
        assert_eq!(info.used_memory_peak_human, "2KB");
        assert_eq!(info.maxmemory, None);
    }

    #[test]
    fn test_garbage_reply() {
        assert_eq!(MemoryInfo::parse("# Memory\r\n"), None);
        assert_eq!(MemoryInfo::parse("used_memory:lots"), None);
    }
}
