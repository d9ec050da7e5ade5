// Bid ranking: deterministic winner selection for one player's bids.

use std::cmp::Ordering;

use super::bid::{ClaimType, EffectiveBid};

/// Compare two entity ids numerically when both parse as integers, lexically
/// otherwise.
///
/// Platform ids are usually numeric strings; comparing "10" below "9" as text
/// would make resolution order depend on id formatting, so numeric order wins
/// whenever it is available.
pub fn id_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(na), Ok(nb)) => na.cmp(&nb),
        _ => a.cmp(b),
    }
}

/// Order the competing bids for one player; the winner is the first element.
///
/// Sorts descending by effective amount. Ties are never broken by submission
/// time; results must be identical however often a batch is replayed:
/// - waiver claims: best (lowest) waiver priority first,
/// - RFA / transition claims: ascending claimant team id.
///
/// An empty input produces an empty result, not an error.
pub fn rank(mut bids: Vec<EffectiveBid>) -> Vec<EffectiveBid> {
    bids.sort_by(|a, b| {
        b.effective_amount
            .cmp(&a.effective_amount)
            .then_with(|| tie_break(a, b))
    });
    bids
}

fn tie_break(a: &EffectiveBid, b: &EffectiveBid) -> Ordering {
    match a.bid.claim_type {
        ClaimType::Waiver => {
            // None sorts after any concrete priority.
            let pa = a.waiver_priority.unwrap_or(u32::MAX);
            let pb = b.waiver_priority.unwrap_or(u32::MAX);
            pa.cmp(&pb)
                .then_with(|| id_cmp(&a.bid.claimant_team_id, &b.bid.claimant_team_id))
        }
        ClaimType::RestrictedFreeAgency | ClaimType::Transition => {
            id_cmp(&a.bid.claimant_team_id, &b.bid.claimant_team_id)
        }
    }
}
