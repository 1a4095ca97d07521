use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::canvas::{BaseImage, Surfaces};
use crate::error::EditorError;

/// Prefix of every payload written to the hidden form fields.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Extensions offered by the file picker.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "gif"];

// ============================================================================
// DECODING
// ============================================================================

/// Decode an in-memory file into a [`BaseImage`].
pub fn decode_base_image(bytes: &[u8], name: &str) -> Result<BaseImage, EditorError> {
    if bytes.is_empty() {
        return Err(EditorError::ImageDecode(format!("'{}' is empty", name)));
    }
    let img = image::load_from_memory(bytes)
        .map_err(|e| EditorError::ImageDecode(format!("'{}': {}", name, e)))?;
    let pixels = img.to_rgba8();
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(EditorError::ImageDecode(format!("'{}' has no pixels", name)));
    }
    Ok(BaseImage::new(pixels, name, bytes.len() as u64))
}

/// Read and decode an image file from disk.
pub fn load_base_image_sync(path: &Path) -> Result<BaseImage, EditorError> {
    let bytes = std::fs::read(path)
        .map_err(|e| EditorError::ImageDecode(format!("{}: {}", path.display(), e)))?;
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    decode_base_image(&bytes, &name)
}

/// Outcome of a background decode, tagged with the path it came from.
pub struct DecodeResult {
    pub path: PathBuf,
    pub result: Result<BaseImage, EditorError>,
}

/// A single-shot background decode. The result is delivered exactly once;
/// the decoded image is never observable before decoding has finished.
pub struct DecodeJob {
    path: PathBuf,
    receiver: mpsc::Receiver<DecodeResult>,
}

impl DecodeJob {
    /// Start decoding `path` on the rayon pool.
    pub fn spawn(path: PathBuf) -> Self {
        let (sender, receiver) = mpsc::channel();
        let job_path = path.clone();
        rayon::spawn(move || {
            let result = load_base_image_sync(&job_path);
            let _ = sender.send(DecodeResult {
                path: job_path,
                result,
            });
        });
        Self { path, receiver }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blocking check, for callers driven by a frame loop.
    /// Returns `None` while the decode is still running.
    pub fn try_finish(&self) -> Option<DecodeResult> {
        match self.receiver.try_recv() {
            Ok(done) => Some(done),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(self.lost()),
        }
    }

    /// Block until the decode completes.
    pub fn wait(self) -> DecodeResult {
        match self.receiver.recv() {
            Ok(done) => done,
            Err(_) => self.lost(),
        }
    }

    fn lost(&self) -> DecodeResult {
        DecodeResult {
            path: self.path.clone(),
            result: Err(EditorError::ImageDecode(
                "decoder stopped without a result".to_string(),
            )),
        }
    }
}

// ============================================================================
// PNG / DATA URL CODEC
// ============================================================================

/// Encode an RGBA surface as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, EditorError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgba8,
        )
        .map_err(|e| EditorError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Encode a surface as a `data:image/png;base64,...` URL.
pub fn to_png_data_url(image: &RgbaImage) -> Result<String, EditorError> {
    let png = encode_png(image)?;
    let mut url = String::with_capacity(PNG_DATA_URL_PREFIX.len() + png.len() * 4 / 3 + 4);
    url.push_str(PNG_DATA_URL_PREFIX);
    STANDARD.encode_string(&png, &mut url);
    Ok(url)
}

/// Decode a base64 data URL into an image. Everything up to the first `,`
/// is treated as the header and ignored, so the media type and the
/// `;base64` marker are optional. `label` names the field in error messages.
pub fn decode_data_url(data_url: &str, label: &str) -> Result<DynamicImage, EditorError> {
    let data_url = data_url.trim();
    if data_url.is_empty() {
        return Err(EditorError::InvalidDataUrl(format!("{} is empty", label)));
    }
    let Some((_, encoded)) = data_url.split_once(',') else {
        return Err(EditorError::InvalidDataUrl(format!("{} has no payload", label)));
    };
    let raw = STANDARD
        .decode(encoded.trim())
        .map_err(|e| EditorError::InvalidDataUrl(format!("{}: {}", label, e)))?;
    image::load_from_memory(&raw)
        .map_err(|e| EditorError::InvalidDataUrl(format!("{}: {}", label, e)))
}

// ============================================================================
// EXPORT
// ============================================================================

/// Snapshot of both surfaces, ready for the hidden form fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedPair {
    pub base_data_url: String,
    pub mask_data_url: String,
    pub width: u32,
    pub height: u32,
}

impl ExportedPair {
    /// Encode the current surfaces. Later drawing does not affect the result.
    pub fn from_surfaces(surfaces: &Surfaces) -> Result<Self, EditorError> {
        let (width, height) = surfaces.dimensions();
        Ok(Self {
            base_data_url: to_png_data_url(&surfaces.base)?,
            mask_data_url: to_png_data_url(&surfaces.mask)?,
            width,
            height,
        })
    }
}

/// Write an RGBA surface to disk as PNG.
pub fn write_png(image: &RgbaImage, path: &Path) -> Result<(), EditorError> {
    let bytes = encode_png(image)?;
    std::fs::write(path, bytes)?;
    Ok(())
}
