// Engine entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Open database, seed league state
// 4. Import the projection pool (optional)
// 5. Review incomplete prior job runs
// 6. Log the auction advisory, if a pool is loaded
// 7. Spawn the notification dispatcher
// 8. Run the periodic batch schedules until Ctrl+C

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};

use claimline::config::{self, Config};
use claimline::db::Database;
use claimline::job;
use claimline::lineup::optimizer::{self, LineupConstraints};
use claimline::lineup::pool;
use claimline::notify::{ChannelNotifier, Notification, Notifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("claimline starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, {} teams, ${} salary cap",
        config.league.name, config.league.num_teams, config.league.salary_cap
    );

    // 3. Open database and seed league state (idempotent)
    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);
    db.seed_league(
        &config.league.id,
        &config.league.team_ids_in_priority_order(),
        &config.league.roster,
    )
    .context("failed to seed league state")?;

    // 4. Import the projection pool when configured
    if let Some(path) = &config.pool_csv {
        match pool::load_pool(std::path::Path::new(path)) {
            Ok(players) => {
                db.import_pool(&players)
                    .context("failed to import player pool")?;
                info!("Imported {} pool players from {}", players.len(), path);
            }
            Err(e) => warn!("pool import skipped: {e}"),
        }
    }

    // 5. Review prior runs. Failed or interrupted runs need no
    // repair (pending bids simply enter the next batch) but are surfaced.
    let incomplete = db
        .incomplete_job_runs()
        .context("failed to read job run history")?;
    for run in &incomplete {
        warn!(
            "prior job run {} ({}) did not complete: status={} error={:?}",
            run.id, run.claim_type, run.status, run.error
        );
    }

    // 6. Advisory auction suggestion (never auto-applied)
    log_auction_advisory(&db, &config);

    // 7. Notification dispatcher. Delivery is out of scope: payloads are
    // drained here and logged for the external push/voice/text dispatcher.
    let (notify_tx, mut notify_rx) = mpsc::channel::<Notification>(256);
    let dispatcher = tokio::spawn(async move {
        while let Some(n) = notify_rx.recv().await {
            info!(team_id = %n.team_id, "dispatching notification: {}", n.message);
        }
    });

    // 8. Run the batch schedules until Ctrl+C
    let db = Arc::new(db);
    let config = Arc::new(config);
    let notifier: Arc<dyn Notifier> = Arc::new(ChannelNotifier::new(notify_tx));
    let jobs = tokio::spawn(job::run(Arc::clone(&db), Arc::clone(&config), notifier));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    jobs.abort();
    dispatcher.abort();
    info!("claimline shut down cleanly");
    Ok(())
}

/// Compute and log the startup auction advisory for the free-agent pool.
fn log_auction_advisory(db: &Database, config: &Config) {
    let pool = match db.free_agent_pool(&config.league.id) {
        Ok(pool) => pool,
        Err(e) => {
            warn!("auction advisory skipped: {e:#}");
            return;
        }
    };
    if pool.is_empty() {
        return;
    }
    let constraints = LineupConstraints::from_roster(&config.league.roster);
    let budget = config.auction.cap_budget(config.league.salary_cap);
    match optimizer::optimize(&pool, &[], budget, &constraints) {
        Some(suggestion) => info!(
            "auction advisory: {} acquisitions, {} projected points, ${} of ${} budget",
            suggestion.selected.len(),
            suggestion.objective_value,
            suggestion.total_cost,
            budget
        ),
        None => info!("auction advisory: no feasible lineup under ${budget}"),
    }
}

/// Initialize tracing to log to a file under `logs/`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("claimline.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("claimline=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
