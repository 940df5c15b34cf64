pub mod config;
pub mod detection;
pub mod error;
pub mod image_io;
pub mod logging;
pub mod normalizer;
pub mod renderer;
pub mod session;
pub mod visualization;

pub use detection::{CenterBox, CornerRect, Detection};
pub use error::{Result, VisionError};
pub use normalizer::{extract_detections, extract_visualization};
pub use renderer::{render, OverlayStyle, RasterSurface, Surface};
