use super::format_amount;
use anyhow::Context;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, Table as Grid};
use dialoguer::{Input, Select};
use potcloud_core::{
    ConnectionStatus, Feedback, Intent, LedgerState, Locale, MemoryBackend, Player, RoomBackend,
    RoomId, SessionError, Storage, SyncEvent, Table, TableConfig,
};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// The room field of the session dialog takes at most this many characters.
const MAX_ROOM_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// In-process only; nobody else can join
    Memory,
    /// Shared database file; other processes on this machine can join
    Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Intent(Intent),
    Session,
    Show,
    Help,
    Quit,
    Unknown,
}

impl Key {
    fn parse(line: &str) -> Self {
        match line.trim().to_lowercase().as_str() {
            "+" | "add" => Key::Intent(Intent::Add),
            "-" | "sub" => Key::Intent(Intent::Subtract),
            "=" | "c" | "commit" => Key::Intent(Intent::Commit),
            "1" => Key::Intent(Intent::DeclareWin(Player::One)),
            "2" => Key::Intent(Intent::DeclareWin(Player::Two)),
            "v" | "void" => Key::Intent(Intent::Void),
            "r" | "reset" => Key::Intent(Intent::Reset),
            "s" | "session" => Key::Session,
            "" | "p" | "show" => Key::Show,
            "?" | "h" | "help" => Key::Help,
            "q" | "quit" | "exit" => Key::Quit,
            _ => Key::Unknown,
        }
    }
}

/// Reads stdin one line at a time, only while asked to.
///
/// A read in flight survives a cancelled `next_line`, so `select!` can race
/// it against the sync ticker. Between lines nothing touches stdin, which
/// leaves it free for the session dialog.
#[derive(Default)]
struct Keyboard {
    pending: Option<JoinHandle<std::io::Result<Option<String>>>>,
}

impl Keyboard {
    async fn next_line(&mut self) -> anyhow::Result<Option<String>> {
        let read = self
            .pending
            .get_or_insert_with(|| tokio::task::spawn_blocking(read_line));
        let line = read.await;
        self.pending = None;
        Ok(line??)
    }
}

fn read_line() -> std::io::Result<Option<String>> {
    let mut line = String::new();
    match std::io::stdin().read_line(&mut line)? {
        0 => Ok(None),
        _ => Ok(Some(line.trim().to_string())),
    }
}

pub async fn play(
    config: TableConfig,
    backend: BackendKind,
    db_path: &Path,
    room: Option<String>,
    as_host: Option<bool>,
) -> anyhow::Result<()> {
    tracing::debug!("Opening table on {:?} backend", backend);
    let backend: Arc<dyn RoomBackend> = match backend {
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
        BackendKind::Sqlite => Arc::new(
            Storage::new(db_path)
                .await
                .with_context(|| format!("Failed to open room database {}", db_path.display()))?,
        ),
    };

    let locale = config.locale;
    let poll_interval = config.poll_interval();
    let mut table = Table::new(config, backend).context("Invalid table config")?;

    match (room, as_host) {
        (Some(room), Some(as_host)) => {
            if let Err(e) = table.start_session(&room, as_host).await {
                println!("{}", e.localized(locale));
                open_session(&mut table, None).await?;
            }
        }
        (room, _) => open_session(&mut table, room).await?,
    }

    print_help();
    println!("{}", render(&table.snapshot(), &table.status()));

    let mut keyboard = Keyboard::default();
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            line = keyboard.next_line() => {
                let Some(line) = line? else { break };
                match Key::parse(&line) {
                    Key::Intent(intent) => {
                        let feedback = table.submit(intent).await;
                        println!("{}: {}", intent, cue(&feedback, locale));
                        println!("{}", render(&table.snapshot(), &table.status()));
                    }
                    Key::Session => {
                        table.end_session();
                        println!("{}", table.status());
                        open_session(&mut table, None).await?;
                        println!("{}", render(&table.snapshot(), &table.status()));
                    }
                    Key::Show => println!("{}", render(&table.snapshot(), &table.status())),
                    Key::Help => print_help(),
                    Key::Quit => break,
                    Key::Unknown => println!("Unknown key '{}' (? for help)", line),
                }
            }
            _ = ticker.tick() => {
                let events = table.sync().await;
                if events.is_empty() {
                    continue;
                }
                for event in &events {
                    if let SyncEvent::Command { intent, feedback } = event {
                        println!("remote {}: {}", intent, cue(feedback, locale));
                    }
                }
                println!("{}", render(&table.snapshot(), &table.status()));
            }
        }
    }

    table.end_session();
    Ok(())
}

/// Ask for a room and a role until the table is bound.
async fn open_session(table: &mut Table, initial: Option<String>) -> anyhow::Result<()> {
    let locale = table.config().locale;
    let mut initial = initial;

    loop {
        let prefill = initial.take();
        let (room, as_host) =
            tokio::task::spawn_blocking(move || session_dialog(prefill, locale)).await??;

        match table.start_session(&room, as_host).await {
            Ok(status) => {
                println!("{}", status);
                return Ok(());
            }
            Err(e) => println!("{}", e.localized(locale)),
        }
    }
}

fn session_dialog(prefill: Option<String>, locale: Locale) -> anyhow::Result<(String, bool)> {
    let mut input = Input::<String>::new()
        .with_prompt("Room")
        .allow_empty(true)
        .validate_with(move |raw: &String| validate_room(raw, locale));
    if let Some(prefill) = prefill {
        input = input.with_initial_text(prefill);
    }
    let room = input.interact_text().context("Room prompt failed")?;

    let roles = vec!["Host (master display)", "Join (remote)"];
    let selection = Select::new()
        .with_prompt("Role")
        .items(&roles)
        .default(0)
        .interact()
        .context("Role prompt failed")?;

    Ok((room, selection == 0))
}

fn validate_room(raw: &str, locale: Locale) -> Result<(), String> {
    RoomId::parse(raw).map_err(|e| e.localized(locale).to_string())?;
    if raw.trim().chars().count() > MAX_ROOM_LEN {
        return Err(format!("At most {} characters", MAX_ROOM_LEN));
    }
    Ok(())
}

fn cue(feedback: &Feedback, locale: Locale) -> String {
    match feedback {
        Feedback::Applied => "ok".to_string(),
        Feedback::Rejected(reason) => format!("refused ({})", reason),
        Feedback::Sent => "sent".to_string(),
        Feedback::Offline => SessionError::NotBound.localized(locale).to_string(),
    }
}

fn render(state: &LedgerState, status: &ConnectionStatus) -> String {
    let mut grid = Grid::new();
    grid.load_preset(UTF8_FULL);
    grid.set_header(vec!["", "PLAYER 01", "PLAYER 02"]);
    grid.add_row(vec![
        "Balance".to_string(),
        format_amount(state.balance1),
        format_amount(state.balance2),
    ]);
    if state.pending_stake > 0 {
        let stake = format!("-{}", format_amount(state.pending_stake));
        grid.add_row(vec!["Stake".to_string(), stake.clone(), stake]);
    }

    let mut out = grid.to_string();
    out.push_str(&format!("\nPOOL {}", format_amount(state.pool)));
    if state.pending_stake > 0 {
        out.push_str(&format!("   STAGING +{}", format_amount(state.staged_total())));
    }
    if let Some(winner) = state.last_winner {
        out.push_str(&format!("\nWINNER: {}", winner.to_string().to_uppercase()));
    }
    out.push_str(&format!("\n[{}]", status));
    out
}

fn print_help() {
    println!("Keys: + stake  - unstake  = commit  1/2 win  v void  r reset");
    println!("      s session  p show  ? help  q quit");
}
