mod azure_openai;
mod base;
mod ollama;

pub use azure_openai::AzureOpenAIClient;
pub use ollama::OllamaClient;
