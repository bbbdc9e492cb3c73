//! Error types for capy-icons

/// Icon subsystem errors
#[derive(Debug, thiserror::Error)]
pub enum IconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("unsupported pixel data: {0}")]
    UnsupportedPixels(String),

    #[error("malformed index.theme: {0}")]
    Theme(String),

    #[error("malformed XPM: {0}")]
    Xpm(String),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}
