//! `clonechat knowledge` — Inspect the knowledge base and test retrieval.

use std::sync::Arc;

use clonechat_agent::Retriever;

use super::runtime;

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config()?;
    let knowledge = config.knowledge_base()?;

    println!("📚 Knowledge base ({} items)", knowledge.len());
    println!();
    for (index, item) in knowledge.iter().enumerate() {
        println!("  {index:>2}. {}", item.topic);
        println!("      keywords: {}", item.keywords.join(", "));
    }

    Ok(())
}

pub async fn query(query: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config()?;
    let retriever = Retriever::new(Arc::new(config.knowledge_base()?));

    match retriever.retrieve_match(&query) {
        Some(found) => {
            println!("✅ Matched \"{}\" (item {}, score {})", found.topic, found.index, found.score);
            println!();
            println!("{}", found.content);
        }
        None => {
            println!("⚠️  No knowledge item matches \"{query}\".");
            println!("   The assistant will answer from general knowledge.");
        }
    }

    Ok(())
}
