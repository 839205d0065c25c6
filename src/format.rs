//! Human-readable byte sizes for tables and popups

const UNITS: &[&str] = &["Bytes", "KB", "MB", "GB", "TB", "PB"];
const STEP: f64 = 1024.0;

/// Format a byte count with binary magnitudes, e.g. `1536` -> `"1.5 KB"`.
///
/// Values are rounded to two decimals and trailing zeros are dropped.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= STEP && unit < UNITS.len() - 1 {
        value /= STEP;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_special_cased() {
        assert_eq!(format_bytes(0), "0 Bytes");
    }

    #[test]
    fn small_values_stay_in_bytes() {
        assert_eq!(format_bytes(1), "1 Bytes");
        assert_eq!(format_bytes(350), "350 Bytes");
        assert_eq!(format_bytes(1023), "1023 Bytes");
    }

    #[test]
    fn magnitudes_drop_trailing_zeros() {
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1_048_576), "1 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5 GB");
    }

    #[test]
    fn largest_unit_saturates() {
        let exabyte = 1024u64.pow(6);
        assert_eq!(format_bytes(exabyte), "1024 PB");
    }
}
