use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use diesel::prelude::*;

use telephony::{
    call_state::STATUS_COMPLETED,
    config::AppConfig,
    db,
    models::Call,
    reconcile::record_communication,
    schema::{calls, communications},
    store::{CallStore, PgCallStore},
};

const USAGE: &str = "Usage: maintenance backfill-communications";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("backfill-communications") => backfill_communications().await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Creates the missing communication for every completed call that has none.
async fn backfill_communications() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        "loaded telephony configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;

    let pending: Vec<Call> = {
        let mut conn = pool.get().context("failed to get database connection")?;
        calls::table
            .left_join(communications::table.on(communications::call_sid.eq(calls::call_sid)))
            .filter(calls::status.eq(STATUS_COMPLETED))
            .filter(communications::id.is_null())
            .select(calls::all_columns)
            .order(calls::started_at.asc())
            .load(&mut conn)
            .context("failed to load completed calls")?
    };

    if pending.is_empty() {
        println!("No completed calls are missing a communication.");
        return Ok(());
    }

    println!("Backfilling {} communications…", pending.len());

    let store: Arc<dyn CallStore> = Arc::new(PgCallStore::new(pool));
    let mut created = 0usize;
    for call in &pending {
        match record_communication(store.as_ref(), call).await {
            Ok(true) => created += 1,
            Ok(false) => {}
            Err(err) => eprintln!("Failed to backfill call {}: {err}", call.call_sid),
        }
    }

    println!("Created {created} communications.");
    Ok(())
}
