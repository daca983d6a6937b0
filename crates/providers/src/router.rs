//! Generation client selection — builds the configured client.

use std::sync::Arc;
use std::time::Duration;

use clonechat_config::GenerationConfig;
use clonechat_core::error::Error;
use clonechat_core::generation::GenerationClient;
use tracing::info;

use crate::gemini::GeminiClient;
use crate::static_reply::StaticClient;

/// Build the generation client named by `config.provider`.
///
/// The Gemini client needs an API key; its absence is a configuration error
/// surfaced at startup rather than on the first submit.
pub fn build_from_config(config: &GenerationConfig) -> Result<Arc<dyn GenerationClient>, Error> {
    let client: Arc<dyn GenerationClient> = match config.provider.as_str() {
        "gemini" => {
            let api_key = config.api_key.clone().ok_or_else(|| Error::Config {
                message: "No API key configured. Set generation.api_key in \
                          ~/.clonechat/config.toml or export GEMINI_API_KEY"
                    .into(),
            })?;
            Arc::new(GeminiClient::new(
                &config.base_url,
                &config.model,
                api_key,
                Duration::from_millis(config.timeout_ms),
            )?)
        }
        "static" => Arc::new(StaticClient::new(&config.static_reply)),
        other => {
            return Err(Error::Config {
                message: format!("Unknown generation provider '{other}'"),
            });
        }
    };

    info!(provider = client.name(), model = %config.model, "Generation client ready");
    Ok(client)
}
