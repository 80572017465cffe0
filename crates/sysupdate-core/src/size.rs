//! Download size labels.

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Converts a size in bytes to a short human-readable label.
///
/// Sizes below one kilobyte round up to `"1 KB"` so a non-empty download
/// never reads as nothing.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        "None".to_string()
    } else if bytes < KIB {
        "1 KB".to_string()
    } else if bytes < MIB {
        format!("{:.0} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "None");
        assert_eq!(format_size(1), "1 KB");
        assert_eq!(format_size(1023), "1 KB");
        assert_eq!(format_size(1024), "1 KB");
        assert_eq!(format_size(250 * 1024), "250 KB");
        assert_eq!(format_size(MIB), "1.0 MB");
        assert_eq!(format_size(2 * MIB + MIB / 2), "2.5 MB");
    }
}
