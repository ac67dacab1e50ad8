pub mod gemini_client;
pub mod generation_client;
pub mod sse;
pub mod title_generator;

pub use gemini_client::GeminiClient;
pub use generation_client::{
    FragmentStream, GenerationClient, GenerationError, ManifestFile, parse_manifest_text,
};
