//! `clonechat chat` — Interactive mode over the shared conversation.
//!
//! Input is read line by line and submitted as one send cycle each. Output
//! never comes from the cycle itself: a log subscription prints every entry
//! the moment it is committed, whoever wrote it.

use std::collections::HashSet;
use std::io::Write;

use clonechat_core::entry::{EntryId, Sender, Snapshot};
use clonechat_core::error::CycleError;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::runtime;

/// Entries of history shown when the session opens.
const HISTORY_PREVIEW: usize = 10;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config()?;
    let rt = runtime::build(config).await?;
    let session_id = rt.session_id();

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Clonechat — Interactive Mode          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:   {}", rt.config.generation.provider);
    println!("  Model:      {}", rt.config.generation.model);
    println!("  Log:        {} ({})", rt.controller.log().name(), rt.config.log.collection_path());
    println!("  Knowledge:  {} topics", rt.controller.retriever().knowledge_base().len());
    println!("  Session:    {session_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut subscription = rt.controller.log().subscribe()?;
    let mut seen: HashSet<EntryId> = HashSet::new();

    if let Some(initial) = subscription.next().await {
        let skip = initial.len().saturating_sub(HISTORY_PREVIEW);
        for entry in initial.iter().skip(skip) {
            println!("{}", runtime::render_entry(entry, &session_id));
        }
        seen.extend(initial.iter().map(|entry| entry.id.clone()));
        if !initial.is_empty() {
            println!();
        }
    }

    let printer_session = session_id.clone();
    let printer = tokio::spawn(async move {
        while let Some(snapshot) = subscription.next().await {
            if print_new_entries(&snapshot, &mut seen, &printer_session) {
                prompt();
            }
        }
    });

    prompt();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let text = match classify(&line) {
            Input::Exit => break,
            Input::Blank => {
                prompt();
                continue;
            }
            Input::Send(text) => text,
        };

        match rt.controller.submit(text).await {
            Ok(_) => {}
            Err(CycleError::Rejected(reason)) => {
                println!("  ⚠️  Not sent: {reason}");
                prompt();
            }
            Err(CycleError::Log(e)) => {
                println!("  ❌ Conversation log error: {e}");
                prompt();
            }
        }
    }

    printer.abort();
    println!("\n  Goodbye!");
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Exit,
    Blank,
    /// The line exactly as typed.
    Send(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        Input::Exit
    } else if trimmed.is_empty() {
        Input::Blank
    } else {
        Input::Send(line)
    }
}

/// Print entries not shown before. The user's own lines are already on
/// screen and are only marked as seen. Returns whether anything was printed.
fn print_new_entries(snapshot: &Snapshot, seen: &mut HashSet<EntryId>, session_id: &str) -> bool {
    let mut printed = false;
    for entry in snapshot.iter() {
        if !seen.insert(entry.id.clone()) {
            continue;
        }
        if entry.sender == Sender::User && entry.author_id == session_id {
            continue;
        }
        if !printed {
            // Clear the pending prompt.
            print!("\r");
        }
        println!("{}", runtime::render_entry(entry, session_id));
        printed = true;
    }
    printed
}

fn prompt() {
    print!("  You > ");
    let _ = std::io::stdout().flush();
}
