//! Generation endpoint clients for Clonechat.
//!
//! All clients implement the `clonechat_core::GenerationClient` trait.
//! [`build_from_config`] selects the client named in configuration.

pub mod gemini;
pub mod router;
pub mod static_reply;

pub use gemini::GeminiClient;
pub use router::build_from_config;
pub use static_reply::StaticClient;
