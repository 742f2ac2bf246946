use thiserror::Error;

/// Structural bounds for a hash table instance, validated once at
/// construction rather than asserted on every operation.
#[derive(Debug, Clone, Copy)]
pub struct HashTableConfig {
    pub header_max_depth: u32,
    pub directory_max_depth: u32,
    pub bucket_max_size: usize,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("header_max_depth {0} exceeds the maximum of {1}")]
    HeaderDepthTooLarge(u32, u32),
    #[error("directory_max_depth {0} exceeds the maximum of {1}")]
    DirectoryDepthTooLarge(u32, u32),
    #[error("bucket_max_size must be at least 1, got {0}")]
    BucketSizeTooSmall(usize),
}

const MAX_HEADER_DEPTH: u32 = 9;
const MAX_DIRECTORY_DEPTH: u32 = 9;

impl HashTableConfig {
    pub fn new(
        header_max_depth: u32,
        directory_max_depth: u32,
        bucket_max_size: usize,
    ) -> Result<Self, ConfigError> {
        if header_max_depth > MAX_HEADER_DEPTH {
            return Err(ConfigError::HeaderDepthTooLarge(
                header_max_depth,
                MAX_HEADER_DEPTH,
            ));
        }
        if directory_max_depth > MAX_DIRECTORY_DEPTH {
            return Err(ConfigError::DirectoryDepthTooLarge(
                directory_max_depth,
                MAX_DIRECTORY_DEPTH,
            ));
        }
        if bucket_max_size < 1 {
            return Err(ConfigError::BucketSizeTooSmall(bucket_max_size));
        }

        Ok(Self {
            header_max_depth,
            directory_max_depth,
            bucket_max_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_header_depth_past_the_bound() {
        assert!(matches!(
            HashTableConfig::new(10, 2, 2),
            Err(ConfigError::HeaderDepthTooLarge(10, 9))
        ));
    }

    #[test]
    fn rejects_zero_bucket_size() {
        assert!(matches!(
            HashTableConfig::new(2, 2, 0),
            Err(ConfigError::BucketSizeTooSmall(0))
        ));
    }

    #[test]
    fn accepts_boundary_values() {
        assert!(HashTableConfig::new(9, 9, 1).is_ok());
    }
}
