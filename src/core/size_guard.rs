/*
 * Admission check for writes that could exhaust on-device storage. The
 * candidate collection is serialized exactly as the store would persist it
 * and its encoded byte length is compared against a ceiling expressed in
 * megabytes. Callers must pass the prospective (post-write) collection so
 * that growth is refused before anything is committed.
 */
use serde::Serialize;
use std::fmt;

pub const DEFAULT_HISTORY_CEILING_MB: f64 = 4.5;

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataSize {
    pub bytes: usize,
    /* Rounded to two decimal places. */
    pub megabytes: f64,
}

impl DataSize {
    pub fn from_bytes(bytes: usize) -> Self {
        let megabytes = bytes as f64 / BYTES_PER_MEGABYTE;
        DataSize {
            bytes,
            megabytes: (megabytes * 100.0).round() / 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SizeGuardError {
    StorageFull { size: DataSize, ceiling_mb: f64 },
}

impl fmt::Display for SizeGuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeGuardError::StorageFull { size, ceiling_mb } => write!(
                f,
                "Storage full: {} MB ({} bytes) exceeds the {ceiling_mb} MB ceiling",
                size.megabytes, size.bytes
            ),
        }
    }
}

impl std::error::Error for SizeGuardError {}

/*
 * Serializes `collection` to JSON and measures its UTF-8 length. A value
 * that cannot be serialized measures as zero bytes; the subsequent write
 * will surface the serialization error itself.
 */
pub fn estimate_size<T: Serialize + ?Sized>(collection: &T) -> DataSize {
    match serde_json::to_vec(collection) {
        Ok(encoded) => DataSize::from_bytes(encoded.len()),
        Err(e) => {
            log::warn!("SizeGuard: Could not serialize collection for size estimate: {e}");
            DataSize::from_bytes(0)
        }
    }
}

pub fn assert_within_limit<T: Serialize + ?Sized>(
    collection: &T,
    ceiling_mb: f64,
) -> Result<DataSize, SizeGuardError> {
    let size = estimate_size(collection);
    if size.megabytes > ceiling_mb {
        log::warn!(
            "SizeGuard: Rejecting write of {} bytes ({} MB), ceiling is {ceiling_mb} MB.",
            size.bytes,
            size.megabytes
        );
        return Err(SizeGuardError::StorageFull { size, ceiling_mb });
    }
    log::trace!(
        "SizeGuard: Admitted {} bytes ({} MB) under {ceiling_mb} MB.",
        size.bytes,
        size.megabytes
    );
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_size_matches_json_length() {
        let values = vec!["ab".to_string(), "é".to_string()];
        // ["ab","é"] is 11 bytes, é being two bytes in UTF-8.
        let size = estimate_size(&values);
        assert_eq!(size.bytes, 11);
        assert_eq!(size.megabytes, 0.0);
    }

    #[test]
    fn test_megabytes_rounded_to_two_decimals() {
        let size = DataSize::from_bytes(1024 * 1024 + 1024 * 100);
        assert_eq!(size.megabytes, 1.1);
        let size = DataSize::from_bytes(3 * 1024 * 1024 / 2);
        assert_eq!(size.megabytes, 1.5);
    }

    #[test]
    fn test_assert_within_limit_rejects_above_ceiling() {
        let big = "x".repeat(2 * 1024 * 1024);
        let result = assert_within_limit(&big, 1.0);
        match result {
            Err(SizeGuardError::StorageFull { size, ceiling_mb }) => {
                assert_eq!(ceiling_mb, 1.0);
                assert_eq!(size.bytes, big.len() + 2);
                assert_eq!(size.megabytes, 2.0);
            }
            other => panic!("Expected StorageFull, got {other:?}"),
        }
    }

    #[test]
    fn test_assert_within_limit_admits_at_ceiling() {
        // Rounds to exactly 1.0 MB, which is not above the ceiling.
        let payload = "y".repeat(1024 * 1024 - 2);
        let size = assert_within_limit(&payload, 1.0).expect("should be admitted");
        assert_eq!(size.bytes, 1024 * 1024);
    }
}
