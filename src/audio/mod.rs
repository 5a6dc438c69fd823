pub mod backend;
pub mod mic;

pub use backend::{AudioChunk, CaptureConfig, CaptureSource};
pub use mic::MicSource;
