// Auction lineup optimization.
//
// Solves the 0/1 integer program: maximize total projected points over a
// player pool subject to a salary budget and per-position slot bounds.
// Already-rostered players are forced into the solution and count toward
// the position bounds without being re-purchased. The search is exact
// branch-and-bound; the bound is the sum of the best remaining point values,
// which is admissible because candidates are scanned in descending order.

use std::collections::HashMap;

use crate::roster::Position;

use super::pool::PoolPlayer;

/// Per-position slot bounds derived from a league's starting-lineup
/// configuration.
///
/// Dedicated slots give each position an exact minimum; FLEX slots raise the
/// maximum of every flex-eligible position. The total selection size always
/// equals dedicated slots + flex slots, so flex capacity cannot be
/// over-consumed across positions.
#[derive(Debug, Clone)]
pub struct LineupConstraints {
    dedicated: HashMap<Position, usize>,
    flex_slots: usize,
}

impl LineupConstraints {
    /// Build constraints from a roster config mapping position strings to
    /// slot counts. Bench and injured-reserve slots are not part of the
    /// starting lineup and are ignored.
    pub fn from_roster(roster_config: &HashMap<String, usize>) -> Self {
        let mut dedicated = HashMap::new();
        let mut flex_slots = 0;
        for (pos_str, &count) in roster_config {
            match Position::from_str_pos(pos_str) {
                Some(Position::Flex) => flex_slots += count,
                Some(Position::Bench) | Some(Position::InjuredReserve) | None => {}
                Some(pos) => {
                    *dedicated.entry(pos).or_insert(0) += count;
                }
            }
        }
        LineupConstraints {
            dedicated,
            flex_slots,
        }
    }

    /// Total number of players a full lineup selects.
    pub fn total_slots(&self) -> usize {
        self.dedicated.values().sum::<usize>() + self.flex_slots
    }

    fn min_for(&self, pos: Position) -> usize {
        self.dedicated.get(&pos).copied().unwrap_or(0)
    }

    fn max_for(&self, pos: Position) -> usize {
        let base = self.min_for(pos);
        if pos.is_flex_eligible() {
            base + self.flex_slots
        } else {
            base
        }
    }
}

/// An optimizer recommendation: which free agents to acquire and the
/// objective achieved (including the forced-in active players' points).
#[derive(Debug, Clone)]
pub struct LineupSuggestion {
    /// Free agents to acquire, in descending projected-point order.
    pub selected: Vec<PoolPlayer>,
    /// Optimal objective for the stated relaxation, in rounded points.
    pub objective_value: i64,
    /// Total cost of the suggested acquisitions.
    pub total_cost: u32,
}

struct Candidate {
    pool_idx: usize,
    position: Position,
    points: i64,
    cost: u32,
}

struct Search<'a> {
    candidates: &'a [Candidate],
    constraints: &'a LineupConstraints,
    budget: u32,
    slots_needed: usize,
    /// points_prefix[i] = sum of the first i candidates' points. Candidates
    /// are sorted descending, so the best k in any suffix are its first k.
    points_prefix: Vec<i64>,
    /// suffix_by_pos[i] = per-position candidate counts in candidates[i..].
    suffix_by_pos: Vec<HashMap<Position, usize>>,
    best_points: Option<i64>,
    best_cost: u32,
    best_set: Vec<usize>,
    chosen: Vec<usize>,
}

impl Search<'_> {
    fn run(&mut self, idx: usize, cost: u32, points: i64, counts: &mut HashMap<Position, usize>) {
        if self.chosen.len() == self.slots_needed {
            // All minimums must be met by the completed selection.
            let mins_met = self
                .constraints
                .dedicated
                .iter()
                .all(|(pos, &min)| counts.get(pos).copied().unwrap_or(0) >= min);
            if !mins_met {
                return;
            }
            let improved = match self.best_points {
                None => true,
                Some(best) => points > best || (points == best && cost < self.best_cost),
            };
            if improved {
                self.best_points = Some(points);
                self.best_cost = cost;
                self.best_set = self.chosen.clone();
            }
            return;
        }
        if idx >= self.candidates.len() {
            return;
        }

        let remaining_slots = self.slots_needed - self.chosen.len();
        if self.candidates.len() - idx < remaining_slots {
            return;
        }

        // Feasibility: every position's minimum must still be reachable.
        let mut deficit_total = 0;
        for (pos, &min) in &self.constraints.dedicated {
            let have = counts.get(pos).copied().unwrap_or(0);
            if have < min {
                let deficit = min - have;
                let available = self.suffix_by_pos[idx].get(pos).copied().unwrap_or(0);
                if available < deficit {
                    return;
                }
                deficit_total += deficit;
            }
        }
        if deficit_total > remaining_slots {
            return;
        }

        // Bound: even the best remaining points cannot beat the incumbent.
        if let Some(best) = self.best_points {
            let top = self.points_prefix[idx + remaining_slots] - self.points_prefix[idx];
            if points + top < best {
                return;
            }
        }

        let cand = &self.candidates[idx];

        // Branch 1: include, when budget and the position maximum allow.
        let have = counts.get(&cand.position).copied().unwrap_or(0);
        if cost + cand.cost <= self.budget && have < self.constraints.max_for(cand.position) {
            *counts.entry(cand.position).or_insert(0) += 1;
            self.chosen.push(cand.pool_idx);
            self.run(idx + 1, cost + cand.cost, points + cand.points, counts);
            self.chosen.pop();
            *counts.get_mut(&cand.position).unwrap() -= 1;
        }

        // Branch 2: exclude.
        self.run(idx + 1, cost, points, counts);
    }
}

/// Compute the optimal acquisition set for an auction.
///
/// - `free_agents`: purchasable players.
/// - `active`: already-rostered players, forced into the solution at zero
///   incremental cost (they count toward position bounds and the objective).
/// - `cap_budget`: total dollars available for acquisitions; callers
///   typically pass a headroom-reduced fraction of the league cap.
///
/// Point values are rounded to the nearest integer before solving. Returns
/// `None` when the constraints are infeasible; callers treat that as "no
/// recommendation", not an error.
pub fn optimize(
    free_agents: &[PoolPlayer],
    active: &[PoolPlayer],
    cap_budget: u32,
    constraints: &LineupConstraints,
) -> Option<LineupSuggestion> {
    let total_slots = constraints.total_slots();
    if active.len() > total_slots {
        return None;
    }
    let slots_needed = total_slots - active.len();

    // Force the active players in; bail out if they alone break a maximum.
    let mut counts: HashMap<Position, usize> = HashMap::new();
    let mut active_points = 0i64;
    for player in active {
        let entry = counts.entry(player.position).or_insert(0);
        *entry += 1;
        if *entry > constraints.max_for(player.position) {
            return None;
        }
        active_points += player.projected_points.round() as i64;
    }

    let active_ids: std::collections::HashSet<&str> =
        active.iter().map(|p| p.id.as_str()).collect();

    // Candidates: free agents that can actually occupy a slot, scanned in
    // descending point order (ties: cheaper first, then id for determinism).
    let mut candidates: Vec<Candidate> = free_agents
        .iter()
        .enumerate()
        .filter(|(_, p)| !active_ids.contains(p.id.as_str()))
        .filter(|(_, p)| constraints.max_for(p.position) > 0)
        .map(|(pool_idx, p)| Candidate {
            pool_idx,
            position: p.position,
            points: p.projected_points.round() as i64,
            cost: p.cost,
        })
        .collect();
    candidates.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| a.cost.cmp(&b.cost))
            .then_with(|| free_agents[a.pool_idx].id.cmp(&free_agents[b.pool_idx].id))
    });

    let mut points_prefix = vec![0i64; candidates.len() + 1];
    for (i, c) in candidates.iter().enumerate() {
        points_prefix[i + 1] = points_prefix[i] + c.points;
    }

    let mut suffix_by_pos: Vec<HashMap<Position, usize>> =
        vec![HashMap::new(); candidates.len() + 1];
    for i in (0..candidates.len()).rev() {
        let mut counts = suffix_by_pos[i + 1].clone();
        *counts.entry(candidates[i].position).or_insert(0) += 1;
        suffix_by_pos[i] = counts;
    }

    let mut search = Search {
        candidates: &candidates,
        constraints,
        budget: cap_budget,
        slots_needed,
        points_prefix,
        suffix_by_pos,
        best_points: None,
        best_cost: 0,
        best_set: Vec::new(),
        chosen: Vec::new(),
    };
    search.run(0, 0, 0, &mut counts);

    let best_points = search.best_points?;
    let mut selected: Vec<PoolPlayer> = search
        .best_set
        .iter()
        .map(|&i| free_agents[i].clone())
        .collect();
    selected.sort_by(|a, b| {
        b.projected_points
            .partial_cmp(&a.projected_points)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let total_cost = selected.iter().map(|p| p.cost).sum();

    Some(LineupSuggestion {
        selected,
        objective_value: best_points + active_points,
        total_cost,
    })
}
