use thiserror::Error;

use crate::buffer_pool_manager::BufferPoolError;
use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum ExtendibleHashTableError {
    #[error("can't grow hash table directory: max depth reached")]
    DirectoryMaxDepthReached,
    #[error("bucket page {0} referenced by the directory is missing")]
    NoBucketForPageId(usize),
    #[error("invalid construction parameters: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error(transparent)]
    BufferPool(#[from] BufferPoolError),
}
