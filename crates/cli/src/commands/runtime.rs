//! Shared wiring: config → session, log store, generation client, controller.

use std::sync::Arc;

use clonechat_agent::{ChatController, Retriever};
use clonechat_config::AppConfig;
use clonechat_core::entry::{ConversationEntry, Sender};
use clonechat_core::session::SessionSource;
use tracing::debug;

/// Everything a command needs to run send cycles.
///
/// The session source is held here so the controller's watch stays live for
/// the lifetime of the command.
pub struct Runtime {
    pub config: AppConfig,
    pub session: SessionSource,
    pub controller: Arc<ChatController>,
}

impl Runtime {
    pub fn session_id(&self) -> String {
        self.session.current().id
    }
}

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Build the runtime from the loaded configuration.
pub async fn build(config: AppConfig) -> Result<Runtime, Box<dyn std::error::Error>> {
    let session = SessionSource::new();
    session.sign_in(config.session.identity.as_deref());
    let ready = session
        .watch()
        .wait_ready()
        .await
        .ok_or("Session closed before sign-in completed")?;
    debug!(session = %ready.id, "Session ready");

    let log = clonechat_log::build_from_config(&config.log)
        .await
        .map_err(|e| format!("Failed to open conversation log: {e}"))?;

    let generator = clonechat_providers::build_from_config(&config.generation)?;

    let knowledge = config.knowledge_base()?;
    let retriever = Retriever::new(Arc::new(knowledge));

    let controller = ChatController::new(log, generator, retriever, session.watch())
        .configured(&config.chat, &config.prompt);

    Ok(Runtime {
        config,
        session,
        controller: Arc::new(controller),
    })
}

/// One printable line for an entry. User entries from other sessions are
/// labelled with a short form of their author id.
pub fn render_entry(entry: &ConversationEntry, own_session: &str) -> String {
    let who = match entry.sender {
        Sender::Assistant => "Assistant".to_string(),
        Sender::User if entry.author_id == own_session => "You".to_string(),
        Sender::User => format!("User {}", entry.author_id.chars().take(8).collect::<String>()),
    };
    format!(
        "  [{}] {who} > {}",
        entry.timestamp.format("%H:%M:%S"),
        entry.text
    )
}
