use image::GrayImage;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Frame has no segments to evaluate")]
    EmptySegments,

    #[error("Image dimensions {actual:?} do not match frame dimensions {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Fails fast when `img` is not `width x height`.
pub fn ensure_dimensions(img: &GrayImage, width: u32, height: u32) -> Result<(), EngineError> {
    let actual = img.dimensions();
    if actual != (width, height) {
        return Err(EngineError::DimensionMismatch {
            expected: (width, height),
            actual,
        });
    }
    Ok(())
}
