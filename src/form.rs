// ============================================================================
// HOST FORM — hidden fields, mask thumbnail and submission preflight
// ============================================================================

use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

use crate::canvas::EditMode;
use crate::error::EditorError;
use crate::io::{ExportedPair, decode_data_url};

/// Hidden field carrying the mask PNG data URL.
pub const FIELD_MASK_DATA: &str = "edit_mask_data";
/// Hidden field carrying the composited base PNG data URL.
pub const FIELD_BASE_DATA: &str = "edit_base_data";
/// Field carrying the selected edit mode.
pub const FIELD_EDIT_MODE: &str = "edit_mode";
/// Field carrying the generation mode id.
pub const FIELD_MODE: &str = "mode";
/// Free-text edit instruction turned into the generation prompt.
pub const FIELD_EDIT_INSTRUCTION: &str = "edit_instruction";
/// File part carrying a mask uploaded instead of drawn.
pub const FIELD_MASK_IMAGE: &str = "edit_mask_image";

/// Which generation request the surrounding form submits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    RoughWithInstructions,
    ReferenceStyleColorize,
    InpaintOutpaint,
}

impl GenerationMode {
    pub fn all() -> &'static [GenerationMode] {
        &[
            GenerationMode::RoughWithInstructions,
            GenerationMode::ReferenceStyleColorize,
            GenerationMode::InpaintOutpaint,
        ]
    }

    pub fn id(&self) -> &'static str {
        match self {
            GenerationMode::RoughWithInstructions => "rough_with_instructions",
            GenerationMode::ReferenceStyleColorize => "reference_style_colorize",
            GenerationMode::InpaintOutpaint => "inpaint_outpaint",
        }
    }

    pub fn label(&self) -> String {
        crate::i18n::translate(&format!("form.mode.{}", self.id()))
    }

    /// Text on the submit button while this mode is active.
    pub fn submit_label(&self) -> String {
        crate::i18n::translate(&format!("form.submit.{}", self.id()))
    }
}

/// Thumbnail of the last applied mask.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskPreview {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

/// A mask file picked directly instead of drawn in the editor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedMask {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// The part of the generation form the mask editor writes into.
#[derive(Clone, Debug, Default)]
pub struct HostForm {
    pub mode: GenerationMode,
    pub edit_mode: EditMode,
    pub edit_instruction: String,
    pub edit_mask_data: String,
    pub edit_base_data: String,
    pub edit_mask_image: Option<UploadedMask>,
    pub mask_preview: Option<MaskPreview>,
    pub mask_meta: String,
}

impl HostForm {
    pub fn new(mode: GenerationMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Store an export in the hidden fields and show its thumbnail.
    /// A drawn mask replaces any uploaded mask file.
    pub fn write_export(&mut self, pair: &ExportedPair, edit_mode: EditMode) {
        self.edit_mask_image = None;
        self.edit_mask_data = pair.mask_data_url.clone();
        self.edit_base_data = pair.base_data_url.clone();
        self.edit_mode = edit_mode;
        self.mask_preview = Some(MaskPreview {
            data_url: pair.mask_data_url.clone(),
            width: pair.width,
            height: pair.height,
        });
        self.mask_meta = t!("form.mask_meta");
    }

    /// Forget the applied mask and base, e.g. when the base file changes.
    pub fn clear_edit_data(&mut self) {
        self.edit_mask_data.clear();
        self.edit_base_data.clear();
        self.reset_mask_preview();
    }

    /// Use an uploaded mask file. The drawn mask payload and its thumbnail
    /// are dropped; the base payload stays.
    pub fn attach_mask_file(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.edit_mask_data.clear();
        self.reset_mask_preview();
        self.edit_mask_image = Some(UploadedMask {
            name: name.into(),
            bytes,
        });
    }

    pub fn reset_mask_preview(&mut self) {
        self.mask_preview = None;
        self.mask_meta.clear();
    }

    pub fn has_mask(&self) -> bool {
        !self.edit_mask_data.is_empty() || self.edit_mask_image.is_some()
    }

    /// Switch the generation mode. Leaving inpaint/outpaint drops the
    /// editor's payloads so they are not submitted with another mode.
    pub fn set_generation_mode(&mut self, mode: GenerationMode) {
        if mode != GenerationMode::InpaintOutpaint {
            self.clear_edit_data();
        }
        self.mode = mode;
    }

    /// Ordered `(name, value)` text pairs for a multipart POST. File parts
    /// come from [`file_parts`](Self::file_parts).
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![(FIELD_MODE, self.mode.id().to_string())];
        if self.mode == GenerationMode::InpaintOutpaint {
            fields.push((FIELD_EDIT_MODE, self.edit_mode.as_str().to_string()));
            fields.push((FIELD_EDIT_INSTRUCTION, self.edit_instruction.clone()));
            fields.push((FIELD_MASK_DATA, self.edit_mask_data.clone()));
            fields.push((FIELD_BASE_DATA, self.edit_base_data.clone()));
        }
        fields
    }

    /// `(field, file name, bytes)` for every file part of the POST.
    pub fn file_parts(&self) -> Vec<(&'static str, &str, &[u8])> {
        match (&self.mode, &self.edit_mask_image) {
            (GenerationMode::InpaintOutpaint, Some(mask)) => {
                vec![(FIELD_MASK_IMAGE, mask.name.as_str(), mask.bytes.as_slice())]
            }
            _ => Vec::new(),
        }
    }

    /// The submitted payload as a JSON object. File parts are listed by name.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = self
            .form_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
            .collect::<serde_json::Map<_, _>>();
        for (field, name, _) in self.file_parts() {
            map.insert(field.to_string(), serde_json::Value::String(name.to_string()));
        }
        serde_json::Value::Object(map)
    }

    /// Run the checks an edit request must pass before it is sent: a mask
    /// was applied or uploaded, both payloads decode, and their sizes agree.
    /// A drawn mask takes precedence over an uploaded file.
    pub fn preflight(&self) -> Result<EditSubmission, EditorError> {
        let mask = if !self.edit_mask_data.is_empty() {
            decode_data_url(&self.edit_mask_data, FIELD_MASK_DATA)?
        } else if let Some(upload) = &self.edit_mask_image {
            image::load_from_memory(&upload.bytes)
                .map_err(|e| EditorError::ImageDecode(format!("'{}': {}", upload.name, e)))?
        } else {
            return Err(EditorError::MissingMask);
        };
        let base = decode_data_url(&self.edit_base_data, FIELD_BASE_DATA)?;

        let base = flatten_on_white(&base.to_rgba8());
        let mask = normalize_mask(&mask.to_rgba8());
        if base.dimensions() != mask.dimensions() {
            return Err(EditorError::SizeMismatch {
                base: base.dimensions(),
                mask: mask.dimensions(),
            });
        }
        Ok(EditSubmission {
            edit_mode: self.edit_mode,
            base,
            mask,
        })
    }
}

/// Decoded, normalised payload of an edit request.
#[derive(Clone, Debug)]
pub struct EditSubmission {
    pub edit_mode: EditMode,
    pub base: RgbImage,
    pub mask: GrayImage,
}

/// Convert mask RGBA to 8-bit luma with `L = (299R + 587G + 114B) / 1000`.
/// Alpha is dropped, so unpainted (transparent black) pixels read 0 and
/// painted red reads 76.
pub fn normalize_mask(mask: &image::RgbaImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let [r, g, b, _] = mask.get_pixel(x, y).0;
        let l = (r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000;
        Luma([l as u8])
    })
}

/// Composite RGBA onto an opaque white background.
pub fn flatten_on_white(image: &image::RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let a = a as u32;
        let mix = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        image::Rgb([mix(r), mix(g), mix(b)])
    })
}
