// ============================================================================
// EDITOR ERRORS
// ============================================================================

/// Everything that can go wrong while loading, editing or exporting a mask.
///
/// All variants are recoverable: the editor reports them through a status
/// message and keeps its previous state.
#[derive(Debug)]
pub enum EditorError {
    /// The selected file could not be read or is not a decodable raster.
    ImageDecode(String),
    /// An operation that needs a base image ran before one was loaded.
    NoBaseImage,
    /// PNG encoding of a surface failed.
    Encode(String),
    /// A hidden form field does not hold a usable `data:` URL.
    InvalidDataUrl(String),
    /// The edit form was submitted without an applied mask.
    MissingMask,
    /// Exported base and mask disagree on dimensions.
    SizeMismatch { base: (u32, u32), mask: (u32, u32) },
    Io(std::io::Error),
}

impl EditorError {
    /// Short, translated text suitable for the status banner.
    pub fn user_message(&self) -> String {
        match self {
            EditorError::ImageDecode(_) => t!("error.image_decode"),
            EditorError::NoBaseImage => t!("error.no_base_image"),
            EditorError::Encode(_) => t!("error.encode"),
            EditorError::InvalidDataUrl(field) => t!("error.invalid_data_url", field = field),
            EditorError::MissingMask => t!("error.missing_mask"),
            EditorError::SizeMismatch { .. } => t!("error.size_mismatch"),
            EditorError::Io(_) => t!("error.io"),
        }
    }
}

impl std::fmt::Display for EditorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditorError::ImageDecode(e) => write!(f, "Image decode error: {}", e),
            EditorError::NoBaseImage => write!(f, "No base image loaded"),
            EditorError::Encode(e) => write!(f, "PNG encode error: {}", e),
            EditorError::InvalidDataUrl(e) => write!(f, "Invalid data URL: {}", e),
            EditorError::MissingMask => write!(f, "Mask data is missing"),
            EditorError::SizeMismatch { base, mask } => write!(
                f,
                "Mask size {}x{} does not match base size {}x{}",
                mask.0, mask.1, base.0, base.1
            ),
            EditorError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for EditorError {}

impl From<std::io::Error> for EditorError {
    fn from(e: std::io::Error) -> Self {
        EditorError::Io(e)
    }
}

impl From<image::ImageError> for EditorError {
    fn from(e: image::ImageError) -> Self {
        EditorError::ImageDecode(e.to_string())
    }
}
