// Settlement: committing batch winners to roster and ledger state.
//
// Selection is provisional, settlement is authoritative: every candidate
// winner is re-validated against a fresh roster snapshot and the current bid
// row immediately before its commit. Each bid settles in its own database
// transaction, so one rejection never blocks or rolls back the rest of the
// batch.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::claim::batch::{select_batch, BatchInput};
use crate::claim::bid::{Bid, BidOutcome, ClaimType, EffectiveBid};
use crate::config::LeagueConfig;
use crate::db::{Database, SettlementWrite};
use crate::lineup::pool::PoolPlayer;
use crate::notify::{Notification, Notifier};

/// The resolution period for a timestamp: ISO week year + week number,
/// e.g. `2026-W32`. Winner uniqueness is keyed per period.
pub fn period_for(as_of: DateTime<Utc>) -> String {
    as_of.format("%G-W%V").to_string()
}

/// A committed award.
#[derive(Debug, Clone)]
pub struct SettledClaim {
    pub bid_id: i64,
    pub team_id: String,
    pub player_id: String,
    pub price: u32,
}

/// What one batch invocation decided and, unless dry-run, committed.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub period: String,
    pub dry_run: bool,
    pub committed: Vec<SettledClaim>,
    /// (bid id, persisted reason) for settlement-time rejections.
    pub rejected: Vec<(i64, String)>,
    /// Bids outbid on a settled player.
    pub lost: Vec<i64>,
    /// (bid id, persisted reason) for selection-time failures.
    pub failed: Vec<(i64, String)>,
    /// Bids left pending for a later pass.
    pub deferred: usize,
}

/// The verdict on one candidate winner just before commit.
enum Candidate {
    /// Validated; settle with this player record.
    Settle(PoolPlayer),
    /// Re-validation failed; persist the reason and try the runner-up.
    Reject(String),
    /// No longer pending (cancelled or processed since selection); skip
    /// without writing an outcome.
    Skip,
}

/// Run one resolution batch for a league and claim type.
///
/// Reads a snapshot of pending bids, selects the processable player groups,
/// and settles each group's winner. With `dry_run` the full selection and
/// validation runs and intended outcomes are logged, but nothing is written
/// and no notifications are sent.
pub async fn run_batch(
    db: &Database,
    league: &LeagueConfig,
    claim_type: ClaimType,
    as_of: DateTime<Utc>,
    dry_run: bool,
    notifier: &dyn Notifier,
) -> Result<BatchReport> {
    let period = period_for(as_of);
    let mut report = BatchReport {
        period: period.clone(),
        dry_run,
        ..BatchReport::default()
    };

    let pending = db
        .pending_bids(&league.id, claim_type)
        .context("failed to load pending bids")?;
    if pending.is_empty() {
        debug!(league = %league.id, claim_type = claim_type.as_str(), "no pending bids");
        return Ok(report);
    }
    info!(
        league = %league.id,
        claim_type = claim_type.as_str(),
        period = %period,
        pending = pending.len(),
        dry_run,
        "starting resolution batch"
    );

    let priorities = db
        .waiver_priorities(&league.id)
        .context("failed to load waiver priorities")?;

    let mut rosters = HashMap::new();
    for bid in &pending {
        if !rosters.contains_key(&bid.claimant_team_id) {
            let snapshot = db
                .roster_snapshot(&league.id, &bid.claimant_team_id, league.salary_cap)
                .context("failed to load claimant roster")?;
            rosters.insert(bid.claimant_team_id.clone(), snapshot);
        }
    }

    let bids: Vec<EffectiveBid> = pending
        .into_iter()
        .map(|bid| {
            let priority = priorities.get(&bid.claimant_team_id).copied();
            EffectiveBid::derive(bid, priority)
        })
        .collect();

    let already_won = db
        .winners_for_period(&league.id, &period)
        .context("failed to load period winners")?;

    let selection = select_batch(BatchInput {
        claim_type,
        bids,
        already_won,
        rosters,
    });
    report.deferred = selection.deferred.len();

    // Selection-time failures are persisted with their reason.
    for (eff, reason) in selection.failed {
        report.failed.push((eff.bid.id, reason.clone()));
        if dry_run {
            info!(bid = eff.bid.id, %reason, "dry run: would fail bid");
            continue;
        }
        db.mark_processed(eff.bid.id, BidOutcome::Failed, Some(&reason))?;
        notify_outcome(db, notifier, &eff.bid, "failed", Some(&reason)).await;
    }

    // Groups arrive in deterministic player-id order; settle each winner,
    // promoting the runner-up when a candidate is rejected.
    for group in selection.processable {
        let mut winner_settled = false;
        for eff in group.ranked {
            if winner_settled {
                report.lost.push(eff.bid.id);
                if dry_run {
                    info!(bid = eff.bid.id, "dry run: would mark bid lost");
                    continue;
                }
                db.mark_processed(eff.bid.id, BidOutcome::Lost, None)?;
                notify_outcome(db, notifier, &eff.bid, "was outbid", None).await;
                continue;
            }

            match validate_candidate(db, league, &eff.bid)? {
                Candidate::Skip => continue,
                Candidate::Reject(reason) => {
                    report.rejected.push((eff.bid.id, reason.clone()));
                    if dry_run {
                        info!(bid = eff.bid.id, %reason, "dry run: would reject bid");
                        continue;
                    }
                    db.mark_processed(
                        eff.bid.id,
                        BidOutcome::RejectedAtSettlement,
                        Some(&reason),
                    )?;
                    notify_outcome(db, notifier, &eff.bid, "was rejected", Some(&reason)).await;
                }
                Candidate::Settle(player) => {
                    if dry_run {
                        info!(
                            bid = eff.bid.id,
                            team = %eff.bid.claimant_team_id,
                            player = %eff.bid.subject_player_id,
                            price = eff.bid.bid_amount,
                            "dry run: would award player"
                        );
                        report.committed.push(SettledClaim {
                            bid_id: eff.bid.id,
                            team_id: eff.bid.claimant_team_id.clone(),
                            player_id: eff.bid.subject_player_id.clone(),
                            price: eff.bid.bid_amount,
                        });
                        winner_settled = true;
                        continue;
                    }
                    match db
                        .settle_winner(&eff.bid, &player, &period)
                        .context("settlement write failed")?
                    {
                        SettlementWrite::Committed => {
                            info!(
                                bid = eff.bid.id,
                                team = %eff.bid.claimant_team_id,
                                player = %eff.bid.subject_player_id,
                                price = eff.bid.bid_amount,
                                "claim settled"
                            );
                            report.committed.push(SettledClaim {
                                bid_id: eff.bid.id,
                                team_id: eff.bid.claimant_team_id.clone(),
                                player_id: eff.bid.subject_player_id.clone(),
                                price: eff.bid.bid_amount,
                            });
                            let msg = format!(
                                "Your {} on {} was awarded for ${}",
                                eff.bid.claim_type.label(),
                                player.name,
                                eff.bid.bid_amount
                            );
                            notifier
                                .notify(Notification {
                                    team_id: eff.bid.claimant_team_id.clone(),
                                    message: msg,
                                })
                                .await;
                            winner_settled = true;
                        }
                        SettlementWrite::Conflict(reason) => {
                            report.rejected.push((eff.bid.id, reason.clone()));
                            db.mark_processed(
                                eff.bid.id,
                                BidOutcome::RejectedAtSettlement,
                                Some(&reason),
                            )?;
                            notify_outcome(db, notifier, &eff.bid, "was rejected", Some(&reason))
                                .await;
                        }
                    }
                }
            }
        }
    }

    info!(
        league = %league.id,
        claim_type = claim_type.as_str(),
        committed = report.committed.len(),
        rejected = report.rejected.len(),
        lost = report.lost.len(),
        failed = report.failed.len(),
        deferred = report.deferred,
        dry_run,
        "resolution batch finished"
    );
    Ok(report)
}

/// Re-validate a candidate winner against current state.
///
/// The bid row is re-read to close the cancellation race window, and the
/// roster snapshot is read fresh, so settlement decisions are made against
/// current roster state even if minutes elapsed since selection.
fn validate_candidate(db: &Database, league: &LeagueConfig, bid: &Bid) -> Result<Candidate> {
    let current = db.bid(bid.id).context("failed to re-read bid")?;
    let Some(current) = current else {
        return Ok(Candidate::Skip);
    };
    if !current.is_pending() {
        debug!(bid = bid.id, "bid no longer pending at settlement; skipping");
        return Ok(Candidate::Skip);
    }

    let Some(player) = db
        .player(&bid.subject_player_id)
        .context("failed to load subject player")?
    else {
        return Ok(Candidate::Reject("player not in pool".to_string()));
    };

    // The player must still be obtainable: a free agent, or (for RFA) still
    // held by the team named as the incumbent on the bid.
    if let Some(owner) = db
        .rostered_by(&league.id, &bid.subject_player_id)
        .context("failed to check player ownership")?
    {
        if bid.incumbent_team_id.as_deref() != Some(owner.as_str()) {
            return Ok(Candidate::Reject("player no longer available".to_string()));
        }
    }

    let roster = db
        .roster_snapshot(&league.id, &bid.claimant_team_id, league.salary_cap)
        .context("failed to load claimant roster")?;

    for release_id in &bid.release_player_ids {
        if !roster.active_contains(release_id) {
            return Ok(Candidate::Reject(
                "release players unavailable".to_string(),
            ));
        }
    }

    // An incumbent re-signing its own tagged player frees that player's slot
    // and salary in the same settlement; fold the subject into the vacancy
    // calculation when the claimant already holds them.
    let mut vacating = bid.release_player_ids.clone();
    if roster.contains(&bid.subject_player_id) {
        vacating.push(bid.subject_player_id.clone());
    }
    if !roster.has_room_after_releases(player.position, &vacating) {
        return Ok(Candidate::Reject("roster is full".to_string()));
    }
    if roster.cap_space_after_releases(&vacating) < bid.bid_amount {
        return Ok(Candidate::Reject("insufficient cap space".to_string()));
    }

    Ok(Candidate::Settle(player))
}

/// Emit a loss/rejection/failure notification for a bid's claimant.
async fn notify_outcome(
    db: &Database,
    notifier: &dyn Notifier,
    bid: &Bid,
    verdict: &str,
    reason: Option<&str>,
) {
    let player_label = db
        .player(&bid.subject_player_id)
        .ok()
        .flatten()
        .map(|p| p.name)
        .unwrap_or_else(|| bid.subject_player_id.clone());
    let message = match reason {
        Some(reason) => format!(
            "Your {} on {} {}: {}",
            bid.claim_type.label(),
            player_label,
            verdict,
            reason
        ),
        None => format!(
            "Your {} on {} {}",
            bid.claim_type.label(),
            player_label,
            verdict
        ),
    };
    notifier
        .notify(Notification {
            team_id: bid.claimant_team_id.clone(),
            message,
        })
        .await;
}
