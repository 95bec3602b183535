use super::format_amount;
use anyhow::Context;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use potcloud_core::{RoomBackend, RoomId, Storage};
use std::path::Path;

async fn open_storage(db_path: &Path) -> anyhow::Result<Storage> {
    Storage::new(db_path)
        .await
        .with_context(|| format!("Failed to open room database {}", db_path.display()))
}

pub async fn inspect_room(db_path: &Path, room: &str) -> anyhow::Result<()> {
    let room = RoomId::parse(room)?;
    let storage = open_storage(db_path).await?;

    println!("Room: {}", room);
    match storage.read_state(&room).await? {
        Some(snapshot) => {
            let state = snapshot.state;
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Field", "Value"]);
            table.add_row(vec!["Player 1".to_string(), format_amount(state.balance1)]);
            table.add_row(vec!["Player 2".to_string(), format_amount(state.balance2)]);
            table.add_row(vec!["Pool".to_string(), format_amount(state.pool)]);
            table.add_row(vec!["Pending stake".to_string(), format_amount(state.pending_stake)]);
            table.add_row(vec![
                "Last winner".to_string(),
                state
                    .last_winner
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]);
            table.add_row(vec![
                "Published".to_string(),
                snapshot.published_at.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            ]);
            table.add_row(vec![
                "Publisher".to_string(),
                format!("{} (seq {})", snapshot.publisher, snapshot.seq),
            ]);
            println!("{}", table);
        }
        None => println!("No state published yet."),
    }

    let pending = storage.pending_commands(&room).await?;
    if pending.is_empty() {
        println!("No queued commands.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Action", "Queued"]);
    for entry in pending {
        let action = match entry.intent() {
            Some(_) => entry.action.clone(),
            None => format!("{} (unknown)", entry.action),
        };
        table.add_row(vec![
            entry.id.to_string(),
            action,
            entry.enqueued_at.format("%H:%M:%S%.3f").to_string(),
        ]);
    }
    println!("{}", table);

    Ok(())
}

pub async fn clear_room(db_path: &Path, room: &str, yes: bool) -> anyhow::Result<()> {
    let room = RoomId::parse(room)?;
    let storage = open_storage(db_path).await?;

    if !yes {
        let prompt = format!("Delete all commands and state for room {}?", room);
        let confirm = tokio::task::spawn_blocking(move || {
            Confirm::new().with_prompt(prompt).default(false).interact()
        })
        .await?
        .context("Confirmation prompt failed")?;

        if !confirm {
            println!("Clear cancelled.");
            return Ok(());
        }
    }

    storage.clear_room(&room).await?;
    println!("Room {} cleared.", room);
    Ok(())
}
