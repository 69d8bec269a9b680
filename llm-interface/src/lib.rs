use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tidal_core::{CoreError, LlmError};

pub mod gemini;

pub use gemini::GeminiProvider;

/// A text-generation backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Sends `prompt` and returns the generated text, giving up after `timeout`.
    async fn get_response_text(&self, prompt: &str, timeout: Duration)
        -> Result<String, CoreError>;
}

pub fn build_prompt(parts: &[&str]) -> String {
    parts.join("\n")
}

/// The supported providers, selected by display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProviderKind {
    GoogleGemini,
}

impl LlmProviderKind {
    pub const ALL: [LlmProviderKind; 1] = [LlmProviderKind::GoogleGemini];

    pub fn display_name(self) -> &'static str {
        match self {
            LlmProviderKind::GoogleGemini => "Google Gemini",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, LlmError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.display_name() == name.trim())
            .ok_or_else(|| LlmError::UnknownProvider {
                name: name.to_string(),
            })
    }

    pub fn build(self, api_key: &str) -> Result<Arc<dyn LlmProvider>, CoreError> {
        if api_key.trim().is_empty() {
            return Err(CoreError::Llm(LlmError::InvalidApiKey {
                provider: self.display_name().to_string(),
            }));
        }
        match self {
            LlmProviderKind::GoogleGemini => Ok(Arc::new(GeminiProvider::new(api_key.trim())?)),
        }
    }
}

impl std::fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Resolves a provider from configuration, rejecting unknown names and empty keys up front.
pub fn provider_from_config(name: &str, api_key: &str) -> Result<Arc<dyn LlmProvider>, CoreError> {
    LlmProviderKind::from_name(name)?.build(api_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt() {
        assert_eq!(build_prompt(&["main", "suffix"]), "main\nsuffix");
        assert_eq!(build_prompt(&["only"]), "only");
        assert_eq!(build_prompt(&[]), "");
    }

    #[test]
    fn test_provider_lookup() {
        assert_eq!(
            LlmProviderKind::from_name("Google Gemini"),
            Ok(LlmProviderKind::GoogleGemini)
        );
        assert_eq!(
            LlmProviderKind::from_name("OpenAI"),
            Err(LlmError::UnknownProvider {
                name: "OpenAI".to_string()
            })
        );
    }

    #[test]
    fn test_build_rejects_empty_key() {
        let err = LlmProviderKind::GoogleGemini.build("  ").err().unwrap();
        assert!(matches!(err, CoreError::Llm(LlmError::InvalidApiKey { .. })));
    }

    #[test]
    fn test_provider_from_config() {
        let provider = provider_from_config("Google Gemini", "key").unwrap();
        assert_eq!(provider.provider_name(), "Google Gemini");

        assert!(matches!(
            provider_from_config("Nope", "key").err().unwrap(),
            CoreError::Llm(LlmError::UnknownProvider { .. })
        ));
    }
}
