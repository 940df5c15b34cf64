use std::io;

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfig(String),

    #[error("Image I/O error: {0}")]
    ImageIo(String),

    #[error("Invalid image format: {0}")]
    InvalidFormat(String),

    #[error("Detection response error: {0}")]
    Response(String),

    #[error("Visualization error: {0}")]
    Visualization(String),

    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, VisionError>;

impl From<io::Error> for VisionError {
    fn from(err: io::Error) -> Self {
        VisionError::ImageIo(err.to_string())
    }
}

impl From<image::ImageError> for VisionError {
    fn from(err: image::ImageError) -> Self {
        VisionError::ImageIo(err.to_string())
    }
}

impl From<toml::de::Error> for VisionError {
    fn from(err: toml::de::Error) -> Self {
        VisionError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VisionError {
    fn from(err: serde_json::Error) -> Self {
        VisionError::Response(err.to_string())
    }
}

impl From<base64::DecodeError> for VisionError {
    fn from(err: base64::DecodeError) -> Self {
        VisionError::Visualization(format!("invalid base64 payload: {}", err))
    }
}

pub fn exit_code(err: &VisionError) -> i32 {
    match err {
        VisionError::Config(_) | VisionError::InvalidConfig(_) => 2,
        VisionError::ImageIo(_) | VisionError::InvalidFormat(_) => 3,
        VisionError::Response(_) | VisionError::Visualization(_) | VisionError::Render(_) => 4,
    }
}
