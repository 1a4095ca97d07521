//! Internationalization (i18n) module for MaskFE.
//!
//! Uses a simple key→string HashMap loaded at runtime from embedded translation data.
//! The `t!("key")` macro looks up the current language, falling back to English.
//! Language can be switched at runtime via `set_language()`.

use std::collections::HashMap;
use std::sync::Mutex;

/// Global translation state.
static I18N: Mutex<Option<I18nState>> = Mutex::new(None);

struct I18nState {
    current_lang: String,
    /// lang_code → (key → translated_string)
    translations: HashMap<String, HashMap<String, String>>,
}

/// Supported languages: (code, native_name)
pub const LANGUAGES: &[(&str, &str)] = &[("en", "English"), ("ja", "日本語")];

/// Initialize the i18n system with embedded translations.
/// Call once at startup; calling again keeps the current language.
pub fn init() {
    let mut translations: HashMap<String, HashMap<String, String>> = HashMap::new();
    translations.insert(
        "en".to_string(),
        parse_translations(include_str!("../locales/en.txt")),
    );
    translations.insert(
        "ja".to_string(),
        parse_translations(include_str!("../locales/ja.txt")),
    );

    if let Ok(mut guard) = I18N.lock() {
        let current_lang = guard
            .as_ref()
            .map(|s| s.current_lang.clone())
            .unwrap_or_else(|| "en".to_string());
        *guard = Some(I18nState {
            current_lang,
            translations,
        });
    }
}

/// Set the active language. If `code` is not a known language, falls back to "en".
pub fn set_language(code: &str) {
    if let Ok(mut guard) = I18N.lock()
        && let Some(ref mut state) = *guard
    {
        if state.translations.contains_key(code) {
            state.current_lang = code.to_string();
        } else {
            state.current_lang = "en".to_string();
        }
    }
}

/// Get the current language code.
pub fn current_language() -> String {
    if let Ok(guard) = I18N.lock()
        && let Some(ref state) = *guard
    {
        return state.current_lang.clone();
    }
    "en".to_string()
}

/// Look up a translation key. Returns the translated string if found,
/// or falls back to English, or returns the key itself as last resort.
pub fn translate(key: &str) -> String {
    if let Ok(guard) = I18N.lock()
        && let Some(ref state) = *guard
    {
        if let Some(map) = state.translations.get(&state.current_lang)
            && let Some(val) = map.get(key)
        {
            return val.clone();
        }
        if state.current_lang != "en"
            && let Some(map) = state.translations.get("en")
            && let Some(val) = map.get(key)
        {
            return val.clone();
        }
    }
    key.to_string()
}

/// Detect the system language and return the best matching language code.
/// Returns "en" if no match is found.
pub fn detect_system_language() -> String {
    for var in &["LANG", "LC_ALL", "LC_MESSAGES", "LANGUAGE"] {
        if let Ok(val) = std::env::var(var)
            && let Some(lang) = match_system_locale(&val)
        {
            return lang;
        }
    }
    "en".to_string()
}

/// Match a system locale string (e.g. "en_US.UTF-8", "ja_JP") to our supported languages.
fn match_system_locale(locale: &str) -> Option<String> {
    let normalized = locale.to_lowercase().replace('_', "-");

    // Language part only, before any '.' or '@'
    let lang_part = normalized.split('.').next().unwrap_or(&normalized);
    let lang_part = lang_part.split('@').next().unwrap_or(lang_part);
    let primary = lang_part.split('-').next().unwrap_or(lang_part);

    LANGUAGES
        .iter()
        .find(|(code, _)| *code == primary)
        .map(|(code, _)| code.to_string())
}

/// Parse a simple key=value translation file.
/// Format: one `key=value` per line. Lines starting with `#` are comments. Empty lines ignored.
fn parse_translations(data: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, val)) = line.split_once('=') {
            map.insert(key.trim().to_string(), val.trim().to_string());
        }
    }
    map
}

/// Translation macro. Usage: `t!("editor.title")` or `t!("error.invalid_data_url", field = "mask")`
#[macro_export]
macro_rules! t {
    ($key:expr) => {
        $crate::i18n::translate($key)
    };
    ($key:expr, $($name:ident = $val:expr),+ $(,)?) => {{
        let mut s = $crate::i18n::translate($key);
        $(
            s = s.replace(concat!("{", stringify!($name), "}"), &format!("{}", $val));
        )+
        s
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines() {
        let map = parse_translations("# comment\n\na.b = Hello\nc=World=!\n");
        assert_eq!(map.get("a.b").map(String::as_str), Some("Hello"));
        assert_eq!(map.get("c").map(String::as_str), Some("World=!"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn locale_matching() {
        assert_eq!(match_system_locale("ja_JP.UTF-8").as_deref(), Some("ja"));
        assert_eq!(match_system_locale("en-GB").as_deref(), Some("en"));
        assert_eq!(match_system_locale("fr_FR"), None);
    }

    #[test]
    fn every_english_key_has_a_japanese_entry() {
        let en = parse_translations(include_str!("../locales/en.txt"));
        let ja = parse_translations(include_str!("../locales/ja.txt"));
        for key in en.keys() {
            assert!(ja.contains_key(key), "missing ja translation for {key}");
        }
    }
}
