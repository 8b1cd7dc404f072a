//! Resident memory reporting for progress logs.

const FIELD_WIDTH: usize = 7;

/// Formats a byte count as `MB KB B` in decimal units, each part padded to
/// seven columns.
pub fn format_memory(bytes: u64) -> String {
    let parts = [
        format!("{}MB", bytes / 1_000_000),
        format!("{}KB", bytes % 1_000_000 / 1000),
        format!("{}B", bytes % 1000),
    ];

    parts
        .iter()
        .map(|part| format!("{part:>width$}", width = FIELD_WIDTH))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resident set size of this process in bytes, where the platform exposes it.
pub fn resident_memory() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

pub fn memory_usage() -> String {
    resident_memory()
        .map(format_memory)
        .unwrap_or_else(|| "n/a".to_string())
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let kilobytes: u64 = line
        .trim_start_matches("VmRSS:")
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kilobytes * 1024)
}
