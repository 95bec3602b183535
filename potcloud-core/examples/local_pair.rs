use potcloud_core::{Player, Storage, Table, TableConfig};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Create temp dir
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("potcloud.db");
    println!("Using room database: {:?}", db_path);

    // Two handles on one file stand in for two machines
    let mut host = Table::new(TableConfig::default(), Arc::new(Storage::new(&db_path).await?))?;
    let mut remote = Table::new(TableConfig::default(), Arc::new(Storage::new(&db_path).await?))?;

    println!("{}", host.start_session("poker-1", true).await?);
    println!("{}", remote.start_session("poker-1", false).await?);

    println!("\nRemote stakes 2,000 and commits...");
    remote.increase_pending().await;
    remote.increase_pending().await;
    remote.commit().await;

    for event in host.sync().await {
        println!("Host handled: {:?}", event);
    }

    println!("\nHost declares player 2 the winner");
    println!("Feedback: {:?}", host.declare_win(Player::Two).await);

    remote.sync().await;
    let state = remote.snapshot();
    println!("\nRemote mirror:");
    println!("Player 1: {}", state.balance1);
    println!("Player 2: {}", state.balance2);
    println!("Pool: {}", state.pool);
    println!("Last winner: {:?}", state.last_winner);

    Ok(())
}
