use crate::math::Vec3;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt data: {0}")]
    CorruptData(String),

    #[error("No frame found at look point {0}")]
    FrameNotFound(Vec3),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Render backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

impl From<ndarray::ShapeError> for ViewerError {
    fn from(err: ndarray::ShapeError) -> Self {
        ViewerError::CorruptData(err.to_string())
    }
}
