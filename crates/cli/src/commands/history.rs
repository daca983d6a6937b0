//! `clonechat history` — Print the shared conversation in display order.

use super::runtime;

pub async fn run(limit: Option<usize>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config()?;
    let log = clonechat_log::build_from_config(&config.log)
        .await
        .map_err(|e| format!("Failed to open conversation log: {e}"))?;

    let snapshot = log.snapshot().await?;
    let skip = limit.map_or(0, |n| snapshot.len().saturating_sub(n));
    let entries = &snapshot[skip..];

    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("  No messages yet. Run `clonechat chat` to start the conversation.");
        return Ok(());
    }

    let own_session = config.session.identity.clone().unwrap_or_default();
    println!("📜 Conversation ({} of {} entries, log: {})", entries.len(), snapshot.len(), log.name());
    println!();
    for entry in entries {
        println!("{}", runtime::render_entry(entry, &own_session));
    }

    Ok(())
}
