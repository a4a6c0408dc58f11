use thiserror::Error;

#[derive(Error, Debug)]
pub enum DepthError {
    #[error("Failed to open frame source: {0}")]
    SourceConstruction(String),

    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Frame processing failed: {0}")]
    Processing(String),

    #[error("Depth estimation failed: {0}")]
    Estimation(String),

    #[error("Sink failure: {0}")]
    Sink(String),

    #[error("Failed to encode output: {0}")]
    Encode(String),

    #[error("Raster size mismatch: frame {frame_width}x{frame_height}, depth {depth_width}x{depth_height}")]
    DimensionMismatch {
        frame_width: usize,
        frame_height: usize,
        depth_width: usize,
        depth_height: usize,
    },

    #[error("Invalid raster dimensions: width={0}, height={1}, samples={2}")]
    InvalidDimensions(usize, usize, usize),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Pipeline has already been started")]
    AlreadyStarted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DepthError>;
