// Claim batch selection: which pending bids are processable in this pass.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::roster::RosterSnapshot;

use super::bid::{ClaimType, EffectiveBid};
use super::ranking::{id_cmp, rank};

/// Reason string persisted when a declared release player is gone.
pub const REASON_RELEASES_UNAVAILABLE: &str = "release players unavailable";
/// Reason string persisted when the subject player already has a winner.
pub const REASON_ALREADY_AWARDED: &str = "player already awarded this period";

/// Everything the selector needs, read once as a snapshot. The selector
/// itself is pure: no side effects, no I/O.
#[derive(Debug)]
pub struct BatchInput {
    pub claim_type: ClaimType,
    /// Pending bids for this league and claim type, already annotated.
    pub bids: Vec<EffectiveBid>,
    /// Players with a recorded winner for the current period.
    pub already_won: HashSet<String>,
    /// Claimant rosters at snapshot time, keyed by team id.
    pub rosters: HashMap<String, RosterSnapshot>,
}

/// The bids competing for one player, ranked; the winner candidate is first.
#[derive(Debug)]
pub struct PlayerGroup {
    pub player_id: String,
    pub ranked: Vec<EffectiveBid>,
}

/// The outcome of one selection pass.
#[derive(Debug)]
pub struct BatchSelection {
    /// Player groups to settle in this pass, in deterministic player-id order.
    pub processable: Vec<PlayerGroup>,
    /// Bids left pending for a later pass (no state change).
    pub deferred: Vec<EffectiveBid>,
    /// Bids to mark failed, with the reason to persist.
    pub failed: Vec<(EffectiveBid, String)>,
}

/// Select the subset of pending bids to process in the current run.
///
/// Filtering:
/// - cancelled or already-processed bids never advance (idempotent re-run);
/// - bids on a player that already has a recorded winner this period are
///   deferred (waiver) or failed (RFA / transition);
/// - bids whose declared release players are no longer on the claimant's
///   active roster are deferred (waiver) or failed with
///   [`REASON_RELEASES_UNAVAILABLE`]; other bids from the same team on other
///   players are unaffected.
///
/// Grouping: remaining bids are grouped by subject player and ranked. In
/// restricted-free-agency mode only the single player carrying the overall
/// highest effective bid (ties broken by ascending player id) is processable
/// per pass (the one-at-a-time claim protocol). Waiver and transition
/// batches process every eligible player in the same pass.
pub fn select_batch(input: BatchInput) -> BatchSelection {
    let mut deferred = Vec::new();
    let mut failed = Vec::new();
    // BTreeMap would sort lexically; collect then sort with id_cmp instead.
    let mut groups: BTreeMap<String, Vec<EffectiveBid>> = BTreeMap::new();

    let fail_at_selection = matches!(
        input.claim_type,
        ClaimType::RestrictedFreeAgency | ClaimType::Transition
    );

    for eff in input.bids {
        if !eff.bid.is_pending() {
            continue;
        }

        if input.already_won.contains(&eff.bid.subject_player_id) {
            if fail_at_selection {
                failed.push((eff, REASON_ALREADY_AWARDED.to_string()));
            } else {
                deferred.push(eff);
            }
            continue;
        }

        let releases_available = input
            .rosters
            .get(&eff.bid.claimant_team_id)
            .is_some_and(|roster| {
                eff.bid
                    .release_player_ids
                    .iter()
                    .all(|id| roster.active_contains(id))
            });
        if !releases_available {
            if fail_at_selection {
                failed.push((eff, REASON_RELEASES_UNAVAILABLE.to_string()));
            } else {
                deferred.push(eff);
            }
            continue;
        }

        groups
            .entry(eff.bid.subject_player_id.clone())
            .or_default()
            .push(eff);
    }

    let mut processable: Vec<PlayerGroup> = groups
        .into_iter()
        .map(|(player_id, bids)| PlayerGroup {
            player_id,
            ranked: rank(bids),
        })
        .collect();
    processable.sort_by(|a, b| id_cmp(&a.player_id, &b.player_id));

    if input.claim_type == ClaimType::RestrictedFreeAgency && processable.len() > 1 {
        // One player per pass: keep the cross-player leader, defer the rest.
        // Groups are already in ascending player-id order, so scanning with
        // a strict `>` lands ties on the lowest player id.
        let mut leader = 0;
        for (idx, group) in processable.iter().enumerate().skip(1) {
            let best = group.ranked[0].effective_amount;
            if best > processable[leader].ranked[0].effective_amount {
                leader = idx;
            }
        }
        let mut kept = Vec::new();
        for (idx, group) in processable.into_iter().enumerate() {
            if idx == leader {
                kept.push(group);
            } else {
                deferred.extend(group.ranked);
            }
        }
        processable = kept;
    }

    BatchSelection {
        processable,
        deferred,
        failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::bid::Bid;
    use crate::roster::{Position, RosterSnapshot, RosteredPlayer};
    use chrono::Utc;

    fn roster_with(team: &str, player_ids: &[&str]) -> RosterSnapshot {
        let mut config = HashMap::new();
        config.insert("BE".to_string(), 10);
        let mut roster = RosterSnapshot::new(team, &config, 200);
        for id in player_ids {
            roster.add(RosteredPlayer {
                player_id: id.to_string(),
                name: format!("Player {id}"),
                position: Position::RunningBack,
                price: 1,
            });
        }
        roster
    }

    fn bid(
        id: i64,
        claim_type: ClaimType,
        team: &str,
        player: &str,
        amount: u32,
        releases: &[&str],
    ) -> Bid {
        Bid {
            id,
            league_id: "league_1".to_string(),
            claim_type,
            claimant_team_id: team.to_string(),
            subject_player_id: player.to_string(),
            bid_amount: amount,
            incumbent_team_id: None,
            release_player_ids: releases.iter().map(|s| s.to_string()).collect(),
            submitted_at: Utc::now(),
            cancelled_at: None,
            processed_at: None,
            outcome: None,
            reason: None,
        }
    }

    fn eff(bid: Bid, priority: Option<u32>) -> EffectiveBid {
        EffectiveBid::derive(bid, priority)
    }

    fn input(claim_type: ClaimType, bids: Vec<EffectiveBid>) -> BatchInput {
        let mut rosters = HashMap::new();
        for e in &bids {
            rosters
                .entry(e.bid.claimant_team_id.clone())
                .or_insert_with(|| roster_with(&e.bid.claimant_team_id, &[]));
        }
        BatchInput {
            claim_type,
            bids,
            already_won: HashSet::new(),
            rosters,
        }
    }

    #[test]
    fn empty_batch_selects_nothing() {
        let sel = select_batch(input(ClaimType::Waiver, vec![]));
        assert!(sel.processable.is_empty());
        assert!(sel.deferred.is_empty());
        assert!(sel.failed.is_empty());
    }

    #[test]
    fn waiver_batch_processes_all_players() {
        let sel = select_batch(input(
            ClaimType::Waiver,
            vec![
                eff(bid(1, ClaimType::Waiver, "team_1", "200", 5, &[]), Some(1)),
                eff(bid(2, ClaimType::Waiver, "team_2", "100", 9, &[]), Some(2)),
                eff(bid(3, ClaimType::Waiver, "team_3", "100", 4, &[]), Some(3)),
            ],
        ));
        assert_eq!(sel.processable.len(), 2);
        // Deterministic numeric player-id order
        assert_eq!(sel.processable[0].player_id, "100");
        assert_eq!(sel.processable[1].player_id, "200");
        // Winner candidate per group is the highest bid
        assert_eq!(sel.processable[0].ranked[0].bid.id, 2);
    }

    #[test]
    fn cancelled_and_processed_bids_are_dropped() {
        let mut cancelled = bid(1, ClaimType::Waiver, "team_1", "100", 5, &[]);
        cancelled.cancelled_at = Some(Utc::now());
        let mut processed = bid(2, ClaimType::Waiver, "team_2", "100", 9, &[]);
        processed.processed_at = Some(Utc::now());

        let sel = select_batch(input(
            ClaimType::Waiver,
            vec![eff(cancelled, Some(1)), eff(processed, Some(2))],
        ));
        assert!(sel.processable.is_empty());
        assert!(sel.deferred.is_empty());
        assert!(sel.failed.is_empty());
    }

    // A player with a recorded winner never re-enters the pool.
    #[test]
    fn already_won_player_is_excluded() {
        let mut inp = input(
            ClaimType::Waiver,
            vec![
                eff(bid(1, ClaimType::Waiver, "team_1", "100", 5, &[]), Some(1)),
                eff(bid(2, ClaimType::Waiver, "team_2", "200", 9, &[]), Some(2)),
            ],
        );
        inp.already_won.insert("100".to_string());

        let sel = select_batch(inp);
        assert_eq!(sel.processable.len(), 1);
        assert_eq!(sel.processable[0].player_id, "200");
        // Waiver-type: left pending, not failed
        assert_eq!(sel.deferred.len(), 1);
        assert_eq!(sel.deferred[0].bid.id, 1);
        assert!(sel.failed.is_empty());
    }

    #[test]
    fn already_won_rfa_bid_is_failed() {
        let mut inp = input(
            ClaimType::RestrictedFreeAgency,
            vec![eff(
                bid(1, ClaimType::RestrictedFreeAgency, "team_1", "100", 5, &[]),
                None,
            )],
        );
        inp.already_won.insert("100".to_string());

        let sel = select_batch(inp);
        assert!(sel.processable.is_empty());
        assert_eq!(sel.failed.len(), 1);
        assert_eq!(sel.failed[0].1, REASON_ALREADY_AWARDED);
    }

    // A declared release player was already dropped elsewhere.
    #[test]
    fn missing_release_excludes_only_that_bid() {
        let mut inp = input(
            ClaimType::Waiver,
            vec![
                eff(
                    bid(1, ClaimType::Waiver, "team_z", "100", 9, &["gone"]),
                    Some(1),
                ),
                eff(bid(2, ClaimType::Waiver, "team_2", "100", 5, &[]), Some(2)),
            ],
        );
        // team_z's roster does not contain "gone"
        inp.rosters
            .insert("team_z".to_string(), roster_with("team_z", &["kept"]));

        let sel = select_batch(inp);
        // team_2's rival claim on the same player proceeds normally
        assert_eq!(sel.processable.len(), 1);
        assert_eq!(sel.processable[0].ranked.len(), 1);
        assert_eq!(sel.processable[0].ranked[0].bid.id, 2);
        // Waiver-type: team_z's bid stays pending
        assert_eq!(sel.deferred.len(), 1);
        assert_eq!(sel.deferred[0].bid.id, 1);
    }

    #[test]
    fn missing_release_fails_rfa_bid_with_reason() {
        let mut inp = input(
            ClaimType::RestrictedFreeAgency,
            vec![eff(
                bid(
                    1,
                    ClaimType::RestrictedFreeAgency,
                    "team_z",
                    "100",
                    9,
                    &["gone"],
                ),
                None,
            )],
        );
        inp.rosters
            .insert("team_z".to_string(), roster_with("team_z", &[]));

        let sel = select_batch(inp);
        assert!(sel.processable.is_empty());
        assert_eq!(sel.failed.len(), 1);
        assert_eq!(sel.failed[0].1, REASON_RELEASES_UNAVAILABLE);
    }

    #[test]
    fn release_on_ir_does_not_count_as_active() {
        let mut config = HashMap::new();
        config.insert("BE".to_string(), 2);
        config.insert("IR".to_string(), 1);
        let mut roster = RosterSnapshot::new("team_z", &config, 200);
        let ir_idx = roster
            .slots
            .iter()
            .position(|s| s.position == Position::InjuredReserve)
            .unwrap();
        roster.slots[ir_idx].player = Some(RosteredPlayer {
            player_id: "stashed".to_string(),
            name: "Stashed".to_string(),
            position: Position::RunningBack,
            price: 3,
        });

        let mut inp = input(
            ClaimType::Waiver,
            vec![eff(
                bid(1, ClaimType::Waiver, "team_z", "100", 9, &["stashed"]),
                Some(1),
            )],
        );
        inp.rosters.insert("team_z".to_string(), roster);

        let sel = select_batch(inp);
        assert!(sel.processable.is_empty());
        assert_eq!(sel.deferred.len(), 1);
    }

    // An RFA max-tie across players resolves to the lower player id.
    #[test]
    fn rfa_selects_single_player_with_tie_on_lower_id() {
        let sel = select_batch(input(
            ClaimType::RestrictedFreeAgency,
            vec![
                eff(
                    bid(1, ClaimType::RestrictedFreeAgency, "team_1", "7002", 20, &[]),
                    None,
                ),
                eff(
                    bid(2, ClaimType::RestrictedFreeAgency, "team_2", "7001", 20, &[]),
                    None,
                ),
                eff(
                    bid(3, ClaimType::RestrictedFreeAgency, "team_3", "7001", 12, &[]),
                    None,
                ),
            ],
        ));

        assert_eq!(sel.processable.len(), 1);
        assert_eq!(sel.processable[0].player_id, "7001");
        assert_eq!(sel.processable[0].ranked.len(), 2);
        // The other player's bid is deferred to the next pass
        assert_eq!(sel.deferred.len(), 1);
        assert_eq!(sel.deferred[0].bid.subject_player_id, "7002");
    }

    #[test]
    fn rfa_selects_overall_highest_effective_bid() {
        let sel = select_batch(input(
            ClaimType::RestrictedFreeAgency,
            vec![
                eff(
                    bid(1, ClaimType::RestrictedFreeAgency, "team_1", "7001", 10, &[]),
                    None,
                ),
                eff(
                    bid(2, ClaimType::RestrictedFreeAgency, "team_2", "7002", 25, &[]),
                    None,
                ),
            ],
        ));
        assert_eq!(sel.processable.len(), 1);
        assert_eq!(sel.processable[0].player_id, "7002");
    }

    #[test]
    fn transition_batch_processes_all_players() {
        let sel = select_batch(input(
            ClaimType::Transition,
            vec![
                eff(bid(1, ClaimType::Transition, "team_1", "7001", 10, &[]), None),
                eff(bid(2, ClaimType::Transition, "team_2", "7002", 25, &[]), None),
            ],
        ));
        assert_eq!(sel.processable.len(), 2);
    }
}
