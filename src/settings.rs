use std::path::PathBuf;

use crate::canvas::EditMode;
use crate::ops::brush::{DEFAULT_BRUSH_SIZE, DEFAULT_MASK_COLOR};

/// Editor settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Brush diameter when a session starts
    pub default_brush_size: u32,
    /// Upper bound for the brush size control
    pub max_brush_size: u32,
    /// RGBA colour painted onto the mask
    pub mask_color: [u8; 4],
    /// Edit mode selected when the app starts
    pub default_edit_mode: EditMode,
    /// Outpaint scale when the app starts
    pub default_scale: f64,
    /// Language code ("en", "ja"). Empty string = auto-detect system language.
    pub language: String,
    /// Directory the file picker opens in
    pub last_open_dir: Option<PathBuf>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            default_brush_size: DEFAULT_BRUSH_SIZE,
            max_brush_size: 512,
            mask_color: DEFAULT_MASK_COLOR,
            default_edit_mode: EditMode::Inpaint,
            default_scale: 1.0,
            language: String::new(),
            last_open_dir: None,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/maskfe/maskfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\MaskFE\maskfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/MaskFE/maskfe_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?
                .join("maskfe");
            return Some(config_dir.join("maskfe_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("MaskFE").join("maskfe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("MaskFE")
                    .join("maskfe_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("maskfe_settings.cfg")))
        }
    }

    /// Serialize an RGBA colour as "r,g,b,a"
    fn color_to_str(c: [u8; 4]) -> String {
        format!("{},{},{},{}", c[0], c[1], c[2], c[3])
    }

    /// Parse an RGBA colour from "r,g,b,a". A fully transparent colour is
    /// rejected: strokes in it would never count as masked.
    fn str_to_color(s: &str) -> Option<[u8; 4]> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return None;
        }
        let mut out = [0u8; 4];
        for (slot, part) in out.iter_mut().zip(parts) {
            *slot = part.trim().parse::<u8>().ok()?;
        }
        (out[3] > 0).then_some(out)
    }

    /// Render the settings as `key=value` lines.
    pub fn to_config_string(&self) -> String {
        format!(
            "default_brush_size={}\n\
             max_brush_size={}\n\
             mask_color={}\n\
             default_edit_mode={}\n\
             default_scale={}\n\
             language={}\n\
             last_open_dir={}\n",
            self.default_brush_size,
            self.max_brush_size,
            Self::color_to_str(self.mask_color),
            self.default_edit_mode.as_str(),
            self.default_scale,
            self.language,
            self.last_open_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        )
    }

    /// Parse `key=value` lines. Unknown keys are ignored and malformed values
    /// keep their defaults.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "default_brush_size" => {
                    if let Ok(v) = value.parse::<u32>() {
                        s.default_brush_size = v.max(1);
                    }
                }
                "max_brush_size" => {
                    if let Ok(v) = value.parse::<u32>() {
                        s.max_brush_size = v.max(1);
                    }
                }
                "mask_color" => {
                    if let Some(c) = Self::str_to_color(value) {
                        s.mask_color = c;
                    }
                }
                "default_edit_mode" => s.default_edit_mode = EditMode::parse(value),
                "default_scale" => {
                    if let Ok(v) = value.parse::<f64>()
                        && v.is_finite()
                    {
                        s.default_scale = v;
                    }
                }
                "language" => s.language = value.to_string(),
                "last_open_dir" => {
                    s.last_open_dir = if value.is_empty() {
                        None
                    } else {
                        Some(PathBuf::from(value))
                    };
                }
                _ => {}
            }
        }
        s.default_brush_size = s.default_brush_size.min(s.max_brush_size);
        s
    }

    /// Load settings from disk, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            log_warn!("Failed to save settings to {}: {}", path.display(), e);
        }
    }

    /// Language to activate: the configured one, or the system language.
    pub fn effective_language(&self) -> String {
        if self.language.is_empty() {
            crate::i18n::detect_system_language()
        } else {
            self.language.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_editor() {
        let s = EditorSettings::default();
        assert_eq!(s.default_brush_size, 24);
        assert_eq!(s.mask_color, [255, 0, 0, 217]);
        assert_eq!(s.default_scale, 1.0);
    }

    #[test]
    fn config_string_parses_back() {
        let s = EditorSettings {
            default_brush_size: 40,
            max_brush_size: 256,
            mask_color: [0, 255, 0, 128],
            default_edit_mode: EditMode::Outpaint,
            default_scale: 1.5,
            language: "ja".to_string(),
            last_open_dir: Some(PathBuf::from("/tmp/pictures")),
        };
        assert_eq!(EditorSettings::parse(&s.to_config_string()), s);
    }

    #[test]
    fn bad_values_fall_back() {
        let s = EditorSettings::parse(
            "default_brush_size=huge\nmask_color=1,2,3\ndefault_scale=NaN\nunknown=1\nnot a pair\n",
        );
        assert_eq!(s, EditorSettings::default());
    }

    #[test]
    fn transparent_mask_color_is_rejected() {
        let s = EditorSettings::parse(
            "mask_color=255,0,0,0\ndefault_edit_mode=outpaint\ndefault_scale=2\n",
        );
        assert_eq!(s.mask_color, DEFAULT_MASK_COLOR);
        assert_eq!(s.default_edit_mode, EditMode::Outpaint);
        assert_eq!(s.default_scale, 2.0);

        let s = EditorSettings::parse("mask_color=0,0,255,1\n");
        assert_eq!(s.mask_color, [0, 0, 255, 1]);
    }

    #[test]
    fn decimal_scale_is_kept_exactly() {
        let s = EditorSettings::parse("default_scale=1.05\n");
        assert_eq!(s.default_scale, 1.05);
    }

    #[test]
    fn brush_default_respects_max() {
        let s = EditorSettings::parse("default_brush_size=900\nmax_brush_size=100\n");
        assert_eq!(s.default_brush_size, 100);
    }
}
