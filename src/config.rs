use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hotkey: HotkeyConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub actuate: ActuateConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey: HotkeyConfig::default(),
            ocr: OcrConfig::default(),
            assistant: AssistantConfig::default(),
            actuate: ActuateConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Self {
        let mut config = if path.exists() {
            fs::read_to_string(path)
                .ok()
                .and_then(|s| toml::from_str(&s).ok())
                .unwrap_or_default()
        } else {
            Config::default()
        };

        config.assistant.resolve();
        config
    }
}

// ============================================================================
// Hotkey Config
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HotkeyConfig {
    /// Trigger key for a pipeline run ("f1".."f12")
    #[serde(default = "default_trigger")]
    pub trigger: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            trigger: default_trigger(),
        }
    }
}

fn default_trigger() -> String {
    "f9".into()
}

// ============================================================================
// OCR Config
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OcrConfig {
    /// Tesseract language pack
    #[serde(default = "default_language")]
    pub language: String,
    /// Page segmentation mode (6 = single uniform block of text)
    #[serde(default = "default_psm")]
    pub psm: i32,
    /// Engine mode (1 = neural/LSTM)
    #[serde(default = "default_oem")]
    pub oem: i32,
    #[serde(default = "default_dpi")]
    pub dpi: i32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            psm: default_psm(),
            oem: default_oem(),
            dpi: default_dpi(),
        }
    }
}

fn default_language() -> String {
    "por".into()
}
fn default_psm() -> i32 {
    6
}
fn default_oem() -> i32 {
    1
}
fn default_dpi() -> i32 {
    150
}

// ============================================================================
// Assistant Config
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AssistantConfig {
    /// Base URL - can use preset or explicit URL
    #[serde(default)]
    pub base_url: String,
    /// Preset shortcuts: "openai", "lm_studio", "ollama"
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// API key (supports ${ENV_VAR} syntax)
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            preset: None,
            model: default_model(),
            api_key: default_api_key(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_api_key() -> String {
    "${OPENAI_API_KEY}".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    500
}

impl AssistantConfig {
    /// Resolve preset to base_url if needed, and expand env vars in api_key
    pub fn resolve(&mut self) {
        if self.base_url.is_empty() {
            self.base_url = match self.preset.as_deref() {
                Some("openai") | None => "https://api.openai.com/v1".to_string(),
                Some("lm_studio") => "http://localhost:1234/v1".to_string(),
                Some("ollama") => "http://localhost:11434/v1".to_string(),
                Some(other) => {
                    eprintln!("Warning: Unknown preset '{}', using OpenAI default", other);
                    "https://api.openai.com/v1".to_string()
                }
            };
        }
        self.api_key = expand_env_vars(&self.api_key);
    }
}

// ============================================================================
// Actuate Config
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ActuateConfig {
    /// Pointer animation duration toward located text
    #[serde(default = "default_pointer_move_ms")]
    pub pointer_move_ms: u64,
    /// Settle time between clipboard write and paste chord
    #[serde(default = "default_paste_delay_ms")]
    pub paste_delay_ms: u64,
}

impl Default for ActuateConfig {
    fn default() -> Self {
        Self {
            pointer_move_ms: default_pointer_move_ms(),
            paste_delay_ms: default_paste_delay_ms(),
        }
    }
}

fn default_pointer_move_ms() -> u64 {
    500
}
fn default_paste_delay_ms() -> u64 {
    500
}

// ============================================================================
// Log Config
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_file")]
    pub file: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

fn default_log_file() -> String {
    "glance.log".into()
}
fn default_log_level() -> String {
    "info".into()
}

/// Expand ${VAR} to environment variable values
fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();

    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_else(|_| {
                eprintln!("Warning: Environment variable '{}' not found", var_name);
                String::new()
            });
            result.replace_range(start..start + end + 1, &value);
        } else {
            break;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.hotkey.trigger, "f9");
        assert_eq!(config.ocr.language, "por");
        assert_eq!(config.ocr.psm, 6);
        assert_eq!(config.ocr.oem, 1);
        assert_eq!(config.assistant.model, "gpt-4o-mini");
        assert_eq!(config.assistant.max_tokens, 500);
        assert_eq!(config.actuate.paste_delay_ms, 500);
        assert_eq!(config.log.file, "glance.log");
    }

    #[test]
    fn partial_toml_overrides_one_section() {
        let config: Config = toml::from_str(
            r#"
            [hotkey]
            trigger = "f2"

            [ocr]
            language = "eng"
            "#,
        )
        .unwrap();
        assert_eq!(config.hotkey.trigger, "f2");
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.psm, 6);
        assert_eq!(config.assistant.model, "gpt-4o-mini");
    }

    #[test]
    fn presets_resolve_to_base_urls() {
        let mut assistant = AssistantConfig {
            preset: Some("lm_studio".to_string()),
            api_key: "key".to_string(),
            ..AssistantConfig::default()
        };
        assistant.resolve();
        assert_eq!(assistant.base_url, "http://localhost:1234/v1");

        let mut assistant = AssistantConfig {
            api_key: "key".to_string(),
            ..AssistantConfig::default()
        };
        assistant.resolve();
        assert_eq!(assistant.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn explicit_base_url_wins_over_preset() {
        let mut assistant = AssistantConfig {
            base_url: "http://example.test/v1".to_string(),
            preset: Some("ollama".to_string()),
            api_key: "key".to_string(),
            ..AssistantConfig::default()
        };
        assistant.resolve();
        assert_eq!(assistant.base_url, "http://example.test/v1");
    }

    #[test]
    fn unknown_env_var_expands_to_empty() {
        assert_eq!(expand_env_vars("${GLANCE_TEST_UNSET_VAR_93}"), "");
        assert_eq!(expand_env_vars("plain-key"), "plain-key");
    }
}
