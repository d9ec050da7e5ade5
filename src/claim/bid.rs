// Bid types, the incumbency boost rule, and submission validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Restricted-free-agency incumbency boost: 20% of the bid...
pub const RFA_BOOST_RATE: f64 = 0.20;
/// ...with a $2 floor so low bids still carry a minimum incumbency edge.
pub const RFA_BOOST_FLOOR: u32 = 2;

/// The kind of claim a bid represents.
///
/// Stored as a text column and dispatched via exhaustive matching;
/// behavior never branches on the presence of optional fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Waiver,
    RestrictedFreeAgency,
    Transition,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Waiver => "waiver",
            ClaimType::RestrictedFreeAgency => "restricted_free_agency",
            ClaimType::Transition => "transition",
        }
    }

    pub fn from_str_type(s: &str) -> Option<Self> {
        match s {
            "waiver" => Some(ClaimType::Waiver),
            "restricted_free_agency" => Some(ClaimType::RestrictedFreeAgency),
            "transition" => Some(ClaimType::Transition),
            _ => None,
        }
    }

    /// Human-readable label used in notification messages.
    pub fn label(&self) -> &'static str {
        match self {
            ClaimType::Waiver => "waiver claim",
            ClaimType::RestrictedFreeAgency => "restricted free agency bid",
            ClaimType::Transition => "transition bid",
        }
    }
}

/// Terminal outcome of a processed bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidOutcome {
    /// Won the resolution and the roster/ledger writes committed.
    Committed,
    /// Won the resolution but failed re-validation at settlement.
    RejectedAtSettlement,
    /// Outbid by another claim on the same player.
    Lost,
    /// Excluded at selection time with a persisted reason (RFA/transition).
    Failed,
}

impl BidOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidOutcome::Committed => "committed",
            BidOutcome::RejectedAtSettlement => "rejected_at_settlement",
            BidOutcome::Lost => "lost",
            BidOutcome::Failed => "failed",
        }
    }

    pub fn from_str_outcome(s: &str) -> Option<Self> {
        match s {
            "committed" => Some(BidOutcome::Committed),
            "rejected_at_settlement" => Some(BidOutcome::RejectedAtSettlement),
            "lost" => Some(BidOutcome::Lost),
            "failed" => Some(BidOutcome::Failed),
            _ => None,
        }
    }
}

/// A claim submitted by a team on a player, as stored in the bids ledger.
///
/// Bids are append-only: once `processed_at` is set the row is immutable,
/// and `cancelled_at` may only be set while `processed_at` is null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub league_id: String,
    pub claim_type: ClaimType,
    pub claimant_team_id: String,
    pub subject_player_id: String,
    /// Non-negative dollar amount; what is charged on a win.
    pub bid_amount: u32,
    /// Team currently holding the restricted-free-agency tag on the player.
    pub incumbent_team_id: Option<String>,
    /// Players the claimant will drop to make roster room, in declared order.
    pub release_player_ids: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub outcome: Option<BidOutcome>,
    pub reason: Option<String>,
}

impl Bid {
    /// Whether this bid is still awaiting resolution.
    pub fn is_pending(&self) -> bool {
        self.cancelled_at.is_none() && self.processed_at.is_none()
    }
}

/// A bid as submitted, before it is assigned an id and a timestamp.
#[derive(Debug, Clone)]
pub struct NewBid {
    pub league_id: String,
    pub claim_type: ClaimType,
    pub claimant_team_id: String,
    pub subject_player_id: String,
    pub bid_amount: u32,
    pub incumbent_team_id: Option<String>,
    pub release_player_ids: Vec<String>,
}

/// Submission-time validation failures. These reject a bid immediately;
/// an invalid bid never enters a batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("subject_player_id must not be empty")]
    MissingPlayer,
    #[error("claimant_team_id must not be empty")]
    MissingTeam,
    #[error("league_id must not be empty")]
    MissingLeague,
    #[error("restricted free agency bids require an incumbent_team_id")]
    MissingIncumbent,
    #[error("release_player_ids contains an empty id")]
    EmptyReleaseId,
    #[error("release_player_ids contains a duplicate: {0}")]
    DuplicateRelease(String),
    #[error("a team cannot declare the subject player as a release")]
    ReleasesSubject,
}

impl NewBid {
    /// Validate the submission shape. Amounts are unsigned so negative bids
    /// are unrepresentable; everything else is checked here.
    pub fn validate(&self) -> Result<(), SubmitError> {
        if self.subject_player_id.is_empty() {
            return Err(SubmitError::MissingPlayer);
        }
        if self.claimant_team_id.is_empty() {
            return Err(SubmitError::MissingTeam);
        }
        if self.league_id.is_empty() {
            return Err(SubmitError::MissingLeague);
        }
        if self.claim_type == ClaimType::RestrictedFreeAgency && self.incumbent_team_id.is_none() {
            return Err(SubmitError::MissingIncumbent);
        }
        let mut seen = std::collections::HashSet::new();
        for id in &self.release_player_ids {
            if id.is_empty() {
                return Err(SubmitError::EmptyReleaseId);
            }
            if *id == self.subject_player_id {
                return Err(SubmitError::ReleasesSubject);
            }
            if !seen.insert(id.as_str()) {
                return Err(SubmitError::DuplicateRelease(id.clone()));
            }
        }
        Ok(())
    }
}

/// Apply the incumbency boost to a bid amount.
///
/// The incumbent's comparison value is raised by 20% of the bid, with a $2
/// floor; non-incumbent bids pass through unchanged. Pure and total over all
/// non-negative amounts. The boosted value is used for ranking only; the
/// original `bid_amount` is what a winner pays.
pub fn boost(bid_amount: u32, is_incumbent: bool) -> u32 {
    if !is_incumbent {
        return bid_amount;
    }
    let raw = (bid_amount as f64 * RFA_BOOST_RATE).round() as u32;
    bid_amount + raw.max(RFA_BOOST_FLOOR)
}

/// A bid annotated with its resolution-time comparison value. Derived per
/// batch, never persisted.
#[derive(Debug, Clone)]
pub struct EffectiveBid {
    pub bid: Bid,
    /// Comparison value after the incumbency boost.
    pub effective_amount: u32,
    /// The claimant's waiver priority at snapshot time (lower is better).
    /// None for claim types that do not use waiver order.
    pub waiver_priority: Option<u32>,
}

impl EffectiveBid {
    /// Annotate a bid with its effective amount and waiver priority.
    ///
    /// The boost applies when the claimant is the team holding the
    /// restricted tag on the subject player.
    pub fn derive(bid: Bid, waiver_priority: Option<u32>) -> Self {
        let is_incumbent = bid
            .incumbent_team_id
            .as_deref()
            .is_some_and(|inc| inc == bid.claimant_team_id);
        let effective_amount = boost(bid.bid_amount, is_incumbent);
        EffectiveBid {
            bid,
            effective_amount,
            waiver_priority,
        }
    }
}
