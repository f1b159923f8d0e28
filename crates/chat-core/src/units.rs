//! Byte-size units and formatting

/// One kibibyte
pub const KIB: u64 = 1024;

/// One mebibyte
pub const MIB: u64 = 1024 * KIB;

/// One gibibyte
pub const GIB: u64 = 1024 * MIB;

/// Size as shown in rejection messages and summaries
///
/// Plain bytes below one KiB, otherwise one decimal in the largest unit
/// that fits ("1.5 KB", "10.0 MB").
pub fn human_size(bytes: u64) -> String {
    let (unit, suffix) = match bytes {
        b if b >= GIB => (GIB, "GB"),
        b if b >= MIB => (MIB, "MB"),
        b if b >= KIB => (KIB, "KB"),
        b => return format!("{} B", b),
    };

    let tenths = (u128::from(bytes) * 10 + u128::from(unit) / 2) / u128::from(unit);
    format!("{}.{} {}", tenths / 10, tenths % 10, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size() {
        let cases = [
            (0, "0 B"),
            (5, "5 B"),
            (1023, "1023 B"),
            (KIB, "1.0 KB"),
            (1536, "1.5 KB"),
            (10 * MIB, "10.0 MB"),
            (11 * MIB + 100, "11.0 MB"),
            (3 * GIB / 2, "1.5 GB"),
        ];

        for (size, expected) in cases {
            assert_eq!(human_size(size), expected, "size {}", size);
        }
    }

    #[test]
    fn test_human_size_does_not_overflow() {
        assert!(human_size(u64::MAX).ends_with(" GB"));
    }
}
