//! HTTP adapters for the collaborator traits

pub mod fetcher;
pub mod openai;

pub use fetcher::HttpFullTextFetcher;
pub use openai::OpenAiClient;
