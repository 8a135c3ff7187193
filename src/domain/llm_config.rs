use serde::{Deserialize, Serialize};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Settings for one model role. The service carries two of these: one for
/// SQL generation, one for result summarization.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LLMConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: GEMINI_BASE_URL.to_string(),
            model: "gemini-2.5-flash-lite".to_string(),
            api_key: None,
            max_output_tokens: Some(2048),
            temperature: Some(0.5),
            timeout_secs: 60,
        }
    }
}

impl LLMConfig {
    pub fn generation() -> Self {
        Self::default()
    }

    pub fn summarization() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            ..Self::default()
        }
    }
}
