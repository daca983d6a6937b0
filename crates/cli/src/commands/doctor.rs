//! `clonechat doctor` — Diagnose system health.

use clonechat_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Clonechat Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found");
    } else {
        println!("  ⚠️  No config file — run `clonechat onboard` (using defaults)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    match config.knowledge_base() {
        Ok(knowledge) => println!("  ✅ Knowledge base: {} topics", knowledge.len()),
        Err(e) => {
            println!("  ❌ Knowledge base invalid: {e}");
            issues += 1;
        }
    }

    match clonechat_log::build_from_config(&config.log).await {
        Ok(log) => match log.snapshot().await {
            Ok(snapshot) => println!(
                "  ✅ Conversation log ({}): {} entries in {}",
                log.name(),
                snapshot.len(),
                config.log.collection_path()
            ),
            Err(e) => {
                println!("  ❌ Conversation log unreadable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Conversation log unavailable: {e}");
            issues += 1;
        }
    }

    if config.generation.provider == "gemini" && !config.has_api_key() {
        println!("  ⚠️  No API key configured — add api_key under [generation] or export GEMINI_API_KEY");
        issues += 1;
    } else {
        match clonechat_providers::build_from_config(&config.generation) {
            Ok(client) => match client.health_check().await {
                Ok(true) => println!("  ✅ Generation endpoint reachable ({})", client.name()),
                Ok(false) => {
                    println!("  ⚠️  Generation endpoint responded with an error ({})", client.name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Generation endpoint unreachable: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Generation client: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
