//! Error types for capy-resources

use crate::Profile;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("path is reserved: {0}")]
    ReservedPath(String),

    #[error("path must start with '/': {0:?}")]
    InvalidPath(String),

    #[error("{path} is a {from} and cannot become a {to}")]
    ProfileChanged {
        path: String,
        from: Profile,
        to: Profile,
    },

    #[error("{path} is outside collection {prefix}")]
    OutsideCollection { path: String, prefix: String },

    #[error("collection already has a writer: {0}")]
    CollectionClaimed(String),
}
