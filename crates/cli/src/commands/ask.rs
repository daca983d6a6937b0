//! `clonechat ask` — Run a single send cycle and print the reply.

use clonechat_agent::GenerationStatus;
use clonechat_core::error::CycleError;

use super::runtime;

pub async fn run(message: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config()?;
    let rt = runtime::build(config).await?;

    eprint!("  Thinking...");
    let result = rt.controller.submit(&message).await;
    eprint!("\r              \r");

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(CycleError::Rejected(reason)) => {
            return Err(format!("Message not sent: {reason}").into());
        }
        Err(CycleError::Log(e)) => {
            return Err(format!("Conversation log error: {e}").into());
        }
    };

    let snapshot = rt.controller.log().snapshot().await?;
    let reply = snapshot
        .iter()
        .find(|entry| entry.id == outcome.reply_entry_id)
        .map(|entry| entry.text.clone())
        .unwrap_or_default();

    println!("{reply}");

    if let GenerationStatus::Failed(kind) = outcome.generation {
        tracing::warn!(?kind, "Reply is an error entry");
    }
    if let Some(topic) = outcome.retrieved_topic {
        tracing::debug!(topic = %topic, "Answer grounded on knowledge item");
    }

    Ok(())
}
