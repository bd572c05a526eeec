use serde::Serialize;

/// Backend used for generation or embeddings.
///
/// Selected through `LLM_KIND` (`ollama` | `openai`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LlmProvider {
    /// Local Ollama runtime.
    Ollama,
    /// OpenAI-compatible REST API.
    OpenAI,
}

impl LlmProvider {
    /// Parses the `LLM_KIND` value, case-insensitive.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "chatgpt" => Some(Self::OpenAI),
            _ => None,
        }
    }
}
