use thiserror::Error;

#[derive(Debug, Error)]
pub enum PsdPackerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid PSD signature: expected '8BPS', found {0:?}")]
    InvalidSignature([u8; 4]),
    #[error("Unsupported PSD version {0} (expected 1 for PSD or 2 for PSB)")]
    UnsupportedVersion(u16),
    #[error("Unexpected end of data at offset {offset} (needed {needed} more bytes)")]
    UnexpectedEof { offset: usize, needed: usize },
    #[error("Malformed PSD: {0}")]
    Format(String),
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid spritesheet descriptor: {0}")]
    Descriptor(String),
    #[error("Encoding error: {0}")]
    Encode(String),
    #[error("Nothing to pack")]
    Empty,
}

pub type Result<T> = std::result::Result<T, PsdPackerError>;
