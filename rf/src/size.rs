//! Human-readable byte sizes

use crate::error::ParseSizeError;

pub const KILOBYTE: u64 = 1 << 10;
pub const MEGABYTE: u64 = 1 << 20;
pub const GIGABYTE: u64 = 1 << 30;

/// Parse a size such as `512`, `64kb`, `10MB` or `2g` into bytes
pub fn parse_size(value: &str) -> Result<u64, ParseSizeError> {
    let trimmed = value.trim().to_ascii_lowercase();
    let invalid = || ParseSizeError {
        value: value.to_string(),
    };

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(split);
    if digits.is_empty() {
        return Err(invalid());
    }

    let multiplier = match suffix.trim() {
        "" | "b" => 1,
        "k" | "kb" => KILOBYTE,
        "m" | "mb" => MEGABYTE,
        "g" | "gb" => GIGABYTE,
        _ => return Err(invalid()),
    };

    let count: u64 = digits.parse().map_err(|_| invalid())?;
    count.checked_mul(multiplier).ok_or_else(invalid)
}

/// Render a byte count with the largest whole unit
pub fn format_file_size(bytes: u64) -> String {
    if bytes >= GIGABYTE {
        format!("{}GB", bytes / GIGABYTE)
    } else if bytes >= MEGABYTE {
        format!("{}MB", bytes / MEGABYTE)
    } else if bytes >= KILOBYTE {
        format!("{}KB", bytes / KILOBYTE)
    } else {
        format!("{}B", bytes)
    }
}
