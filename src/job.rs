// Periodic batch-job runner.
//
// Each claim type runs on its own schedule. A tick performs one recorded
// batch invocation; a fatal error marks the run failed and the next tick
// retries. There is no cross-tick state; idempotence comes from the
// already-successful exclusion filter in batch selection.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::claim::bid::ClaimType;
use crate::config::Config;
use crate::db::Database;
use crate::notify::Notifier;
use crate::settle::{self, BatchReport};

/// Run one recorded batch invocation.
///
/// Job-run bookkeeping wraps the batch so a fatal abort (database
/// unreachable, malformed state) is persisted with its error text.
/// Already-committed per-bid settlements stay committed; unprocessed bids
/// remain pending and are safe to reconsider on the next invocation.
pub async fn run_once(
    db: &Database,
    config: &Config,
    claim_type: ClaimType,
    notifier: &dyn Notifier,
) -> Result<BatchReport> {
    let run_id = db.start_job_run(&config.league.id, claim_type)?;
    let result = settle::run_batch(
        db,
        &config.league,
        claim_type,
        Utc::now(),
        config.jobs.dry_run,
        notifier,
    )
    .await;

    match result {
        Ok(report) => {
            db.finish_job_run(run_id, "completed", None)?;
            Ok(report)
        }
        Err(e) => {
            db.finish_job_run(run_id, "failed", Some(&format!("{e:#}")))?;
            Err(e)
        }
    }
}

/// Drive the periodic schedule for every claim type until the task is
/// cancelled.
pub async fn run(db: Arc<Database>, config: Arc<Config>, notifier: Arc<dyn Notifier>) {
    let schedules = [
        (ClaimType::Waiver, config.jobs.waiver_interval_secs),
        (
            ClaimType::RestrictedFreeAgency,
            config.jobs.rfa_interval_secs,
        ),
        (ClaimType::Transition, config.jobs.transition_interval_secs),
    ];

    let mut handles = Vec::new();
    for (claim_type, secs) in schedules {
        let db = Arc::clone(&db);
        let config = Arc::clone(&config);
        let notifier = Arc::clone(&notifier);
        handles.push(tokio::spawn(async move {
            info!(
                claim_type = claim_type.as_str(),
                interval_secs = secs,
                "batch schedule started"
            );
            let mut ticker = interval(Duration::from_secs(secs));
            // An overlapping tick waits for the running batch instead of
            // bursting; double-award is additionally backstopped in the DB.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = run_once(&db, &config, claim_type, notifier.as_ref()).await {
                    error!(
                        claim_type = claim_type.as_str(),
                        "batch failed; will retry next tick: {e:#}"
                    );
                }
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::bid::NewBid;
    use crate::config::{AuctionConfig, JobsConfig, LeagueConfig};
    use crate::lineup::pool::PoolPlayer;
    use crate::notify::LogNotifier;
    use crate::roster::Position;
    use std::collections::HashMap;

    fn test_config() -> Config {
        let mut roster = HashMap::new();
        roster.insert("RB".to_string(), 2);
        roster.insert("BE".to_string(), 2);
        let teams: HashMap<String, String> = (1..=4)
            .map(|i| (format!("team_{i}"), format!("Team {i}")))
            .collect();
        Config {
            league: LeagueConfig {
                id: "league_1".to_string(),
                name: "Test League".to_string(),
                num_teams: 4,
                salary_cap: 100,
                roster,
                teams,
            },
            jobs: JobsConfig {
                waiver_interval_secs: 300,
                rfa_interval_secs: 120,
                transition_interval_secs: 600,
                dry_run: false,
            },
            auction: AuctionConfig::default(),
            db_path: ":memory:".to_string(),
            pool_csv: None,
        }
    }

    fn seeded_db(config: &Config) -> Database {
        let db = Database::open(":memory:").unwrap();
        db.seed_league(
            &config.league.id,
            &config.league.team_ids_in_priority_order(),
            &config.league.roster,
        )
        .unwrap();
        db
    }

    #[tokio::test]
    async fn run_once_records_completed_job_run() {
        let config = test_config();
        let db = seeded_db(&config);
        db.upsert_player(&PoolPlayer {
            id: "p1".to_string(),
            name: "Player p1".to_string(),
            position: Position::RunningBack,
            projected_points: 100.0,
            cost: 10,
        })
        .unwrap();
        db.submit_bid(&NewBid {
            league_id: config.league.id.clone(),
            claim_type: ClaimType::Waiver,
            claimant_team_id: "team_1".to_string(),
            subject_player_id: "p1".to_string(),
            bid_amount: 5,
            incumbent_team_id: None,
            release_player_ids: vec![],
        })
        .unwrap();

        let report = run_once(&db, &config, ClaimType::Waiver, &LogNotifier)
            .await
            .unwrap();
        assert_eq!(report.committed.len(), 1);

        // The run is recorded as completed.
        assert!(db.incomplete_job_runs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_once_with_empty_queue_completes() {
        let config = test_config();
        let db = seeded_db(&config);
        let report = run_once(&db, &config, ClaimType::Waiver, &LogNotifier)
            .await
            .unwrap();
        assert!(report.committed.is_empty());
        assert!(db.incomplete_job_runs().unwrap().is_empty());
    }
}
