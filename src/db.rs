// SQLite persistence layer for bids, rosters, and the transaction ledger.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};
use tracing::warn;

use crate::claim::bid::{Bid, BidOutcome, ClaimType, NewBid};
use crate::lineup::pool::PoolPlayer;
use crate::roster::{Position, RosterSlot, RosterSnapshot, RosteredPlayer};

/// One row in the append-only transactions ledger.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub id: i64,
    pub league_id: String,
    pub period: String,
    pub team_id: String,
    pub player_id: String,
    pub price: u32,
    pub kind: String,
    pub recorded_at: DateTime<Utc>,
}

/// Result of attempting to commit a winning bid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementWrite {
    /// All roster and ledger writes committed.
    Committed,
    /// Nothing was written; the reason describes the conflict.
    Conflict(String),
}

/// One recorded batch-job invocation.
#[derive(Debug, Clone)]
pub struct JobRun {
    pub id: i64,
    pub league_id: String,
    pub claim_type: String,
    pub status: String,
    pub error: Option<String>,
}

/// SQLite-backed persistence for players, bids, rosters, waiver priority,
/// the winners backstop, and the transactions ledger.
pub struct Database {
    conn: Mutex<Connection>,
}

fn now_str() -> String {
    Utc::now().to_rfc3339()
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp in database: {s}"))
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                id               TEXT PRIMARY KEY,
                name             TEXT NOT NULL,
                position         TEXT NOT NULL,
                projected_points REAL NOT NULL DEFAULT 0,
                cost             INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS bids (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id          TEXT NOT NULL,
                claim_type         TEXT NOT NULL,
                claimant_team_id   TEXT NOT NULL,
                subject_player_id  TEXT NOT NULL,
                bid_amount         INTEGER NOT NULL CHECK (bid_amount >= 0),
                incumbent_team_id  TEXT,
                release_player_ids TEXT NOT NULL DEFAULT '[]',
                submitted_at       TEXT NOT NULL,
                cancelled_at       TEXT,
                processed_at       TEXT,
                outcome            TEXT,
                reason             TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_bids_league_type
                ON bids(league_id, claim_type);

            CREATE TABLE IF NOT EXISTS roster_slots (
                league_id   TEXT NOT NULL,
                team_id     TEXT NOT NULL,
                slot_index  INTEGER NOT NULL,
                position    TEXT NOT NULL,
                player_id   TEXT,
                player_name TEXT,
                price       INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (league_id, team_id, slot_index)
            );

            CREATE TABLE IF NOT EXISTS waiver_priority (
                league_id TEXT NOT NULL,
                team_id   TEXT NOT NULL,
                priority  INTEGER NOT NULL,
                PRIMARY KEY (league_id, team_id)
            );

            CREATE TABLE IF NOT EXISTS winners (
                league_id   TEXT NOT NULL,
                period      TEXT NOT NULL,
                player_id   TEXT NOT NULL,
                bid_id      INTEGER NOT NULL REFERENCES bids(id),
                team_id     TEXT NOT NULL,
                price       INTEGER NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (league_id, period, player_id)
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id   TEXT NOT NULL,
                period      TEXT NOT NULL,
                team_id     TEXT NOT NULL,
                player_id   TEXT NOT NULL,
                price       INTEGER NOT NULL,
                kind        TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS job_runs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id   TEXT NOT NULL,
                claim_type  TEXT NOT NULL,
                started_at  TEXT NOT NULL,
                finished_at TEXT,
                status      TEXT NOT NULL DEFAULT 'running',
                error       TEXT
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // League seeding
    // ------------------------------------------------------------------

    /// Create empty roster slots and seed waiver priority for every team.
    ///
    /// Idempotent: teams that already have slots or a priority entry are
    /// left untouched, so re-running at startup is safe. `team_ids` must be
    /// in initial waiver-priority order (best priority first).
    pub fn seed_league(
        &self,
        league_id: &str,
        team_ids: &[String],
        roster_config: &HashMap<String, usize>,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin seed transaction")?;

        for (rank, team_id) in team_ids.iter().enumerate() {
            let template = RosterSnapshot::new(team_id, roster_config, 0);
            for (slot_index, slot) in template.slots.iter().enumerate() {
                tx.execute(
                    "INSERT OR IGNORE INTO roster_slots
                        (league_id, team_id, slot_index, position)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        league_id,
                        team_id,
                        slot_index as i64,
                        slot.position.display_str()
                    ],
                )
                .context("failed to seed roster slot")?;
            }
            tx.execute(
                "INSERT OR IGNORE INTO waiver_priority (league_id, team_id, priority)
                 VALUES (?1, ?2, ?3)",
                params![league_id, team_id, (rank + 1) as i64],
            )
            .context("failed to seed waiver priority")?;
        }

        tx.commit().context("failed to commit league seed")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Insert a player or update their record in a single atomic statement.
    pub fn upsert_player(&self, player: &PoolPlayer) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO players (id, name, position, projected_points, cost)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name             = excluded.name,
                position         = excluded.position,
                projected_points = excluded.projected_points,
                cost             = excluded.cost",
            params![
                player.id,
                player.name,
                player.position.display_str(),
                player.projected_points,
                player.cost,
            ],
        )
        .context("failed to upsert player")?;
        Ok(())
    }

    /// Import a full player pool in one transaction.
    pub fn import_pool(&self, players: &[PoolPlayer]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin pool import transaction")?;
        for player in players {
            tx.execute(
                "INSERT INTO players (id, name, position, projected_points, cost)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name             = excluded.name,
                    position         = excluded.position,
                    projected_points = excluded.projected_points,
                    cost             = excluded.cost",
                params![
                    player.id,
                    player.name,
                    player.position.display_str(),
                    player.projected_points,
                    player.cost,
                ],
            )
            .context("failed to import pool player")?;
        }
        tx.commit().context("failed to commit pool import")?;
        Ok(())
    }

    /// Look up a player by id.
    pub fn player(&self, player_id: &str) -> Result<Option<PoolPlayer>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name, position, projected_points, cost FROM players WHERE id = ?1")
            .context("failed to prepare player query")?;
        let mut rows = stmt
            .query_map(params![player_id], row_to_pool_player)
            .context("failed to query player")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to read player row")?)),
            None => Ok(None),
        }
    }

    /// Players not currently on any roster in the league, best projection
    /// first. This is the optimizer's purchasable pool.
    pub fn free_agent_pool(&self, league_id: &str) -> Result<Vec<PoolPlayer>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, position, projected_points, cost FROM players
                 WHERE id NOT IN (
                    SELECT player_id FROM roster_slots
                    WHERE league_id = ?1 AND player_id IS NOT NULL
                 )
                 ORDER BY projected_points DESC, id",
            )
            .context("failed to prepare free agent query")?;
        let players = stmt
            .query_map(params![league_id], row_to_pool_player)
            .context("failed to query free agents")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map free agent rows")?;
        Ok(players)
    }

    // ------------------------------------------------------------------
    // Bids
    // ------------------------------------------------------------------

    /// Validate and record a new bid. Returns the bid id.
    pub fn submit_bid(&self, new_bid: &NewBid) -> Result<i64> {
        new_bid.validate().context("bid rejected at submission")?;
        let conn = self.conn();
        let releases = serde_json::to_string(&new_bid.release_player_ids)
            .context("failed to serialize release_player_ids")?;
        conn.execute(
            "INSERT INTO bids
                (league_id, claim_type, claimant_team_id, subject_player_id,
                 bid_amount, incumbent_team_id, release_player_ids, submitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                new_bid.league_id,
                new_bid.claim_type.as_str(),
                new_bid.claimant_team_id,
                new_bid.subject_player_id,
                new_bid.bid_amount,
                new_bid.incumbent_team_id,
                releases,
                now_str(),
            ],
        )
        .context("failed to insert bid")?;
        Ok(conn.last_insert_rowid())
    }

    /// Cancel a bid if it is still pending. Returns `true` when a row was
    /// updated; `false` when the bid was already processed or cancelled.
    /// The pending-only guard lives in the SQL, closing the race with a
    /// concurrently running batch.
    pub fn cancel_bid(&self, bid_id: i64) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE bids SET cancelled_at = ?1
                 WHERE id = ?2 AND processed_at IS NULL AND cancelled_at IS NULL",
                params![now_str(), bid_id],
            )
            .context("failed to cancel bid")?;
        Ok(changed > 0)
    }

    /// Load a single bid by id.
    pub fn bid(&self, bid_id: i64) -> Result<Option<Bid>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("{BID_COLUMNS} WHERE id = ?1"))
            .context("failed to prepare bid query")?;
        let mut rows = stmt
            .query_map(params![bid_id], row_to_bid_raw)
            .context("failed to query bid")?;
        match rows.next() {
            Some(row) => {
                let raw = row.context("failed to read bid row")?;
                Ok(Some(raw_to_bid(raw)?))
            }
            None => Ok(None),
        }
    }

    /// All pending (not cancelled, not processed) bids for a league and
    /// claim type, in submission order.
    pub fn pending_bids(&self, league_id: &str, claim_type: ClaimType) -> Result<Vec<Bid>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "{BID_COLUMNS}
                 WHERE league_id = ?1 AND claim_type = ?2
                   AND cancelled_at IS NULL AND processed_at IS NULL
                 ORDER BY id"
            ))
            .context("failed to prepare pending bids query")?;
        let raws = stmt
            .query_map(params![league_id, claim_type.as_str()], row_to_bid_raw)
            .context("failed to query pending bids")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map pending bid rows")?;
        raws.into_iter().map(raw_to_bid).collect()
    }

    /// Mark a pending bid as processed with a terminal outcome. A bid that
    /// is no longer pending is left untouched (the update is guarded in SQL).
    pub fn mark_processed(
        &self,
        bid_id: i64,
        outcome: BidOutcome,
        reason: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE bids SET processed_at = ?1, outcome = ?2, reason = ?3
                 WHERE id = ?4 AND processed_at IS NULL",
                params![now_str(), outcome.as_str(), reason, bid_id],
            )
            .context("failed to mark bid processed")?;
        if changed == 0 {
            warn!("bid {bid_id} was already processed; outcome unchanged");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Winners / waiver priority
    // ------------------------------------------------------------------

    /// Player ids with a recorded winner for the given period.
    pub fn winners_for_period(&self, league_id: &str, period: &str) -> Result<HashSet<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT player_id FROM winners WHERE league_id = ?1 AND period = ?2")
            .context("failed to prepare winners query")?;
        let ids = stmt
            .query_map(params![league_id, period], |row| row.get::<_, String>(0))
            .context("failed to query winners")?
            .collect::<std::result::Result<HashSet<_>, _>>()
            .context("failed to map winner rows")?;
        Ok(ids)
    }

    /// Current waiver priority per team (lower is better).
    pub fn waiver_priorities(&self, league_id: &str) -> Result<HashMap<String, u32>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT team_id, priority FROM waiver_priority WHERE league_id = ?1")
            .context("failed to prepare waiver priority query")?;
        let map = stmt
            .query_map(params![league_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
            })
            .context("failed to query waiver priority")?
            .collect::<std::result::Result<HashMap<_, _>, _>>()
            .context("failed to map waiver priority rows")?;
        Ok(map)
    }

    // ------------------------------------------------------------------
    // Rosters
    // ------------------------------------------------------------------

    /// Read a team's roster fresh from the store.
    pub fn roster_snapshot(
        &self,
        league_id: &str,
        team_id: &str,
        salary_cap: u32,
    ) -> Result<RosterSnapshot> {
        let conn = self.conn();
        load_snapshot(&conn, league_id, team_id, salary_cap)
    }

    /// Which team (if any) currently rosters the given player.
    pub fn rostered_by(&self, league_id: &str, player_id: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id FROM roster_slots
                 WHERE league_id = ?1 AND player_id = ?2",
            )
            .context("failed to prepare rostered_by query")?;
        let mut rows = stmt
            .query_map(params![league_id, player_id], |row| {
                row.get::<_, String>(0)
            })
            .context("failed to query rostered_by")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to read rostered_by row")?)),
            None => Ok(None),
        }
    }

    /// Place a player into a team's first suitable empty slot (dedicated,
    /// then FLEX, then bench). Used for roster imports and manual adds.
    /// Returns `false` when the roster has no room.
    pub fn assign_player(
        &self,
        league_id: &str,
        team_id: &str,
        player: &PoolPlayer,
        price: u32,
    ) -> Result<bool> {
        let conn = self.conn();
        let snapshot = load_snapshot(&conn, league_id, team_id, 0)?;
        let Some(slot_index) = snapshot.slot_for(player.position) else {
            return Ok(false);
        };
        conn.execute(
            "UPDATE roster_slots SET player_id = ?1, player_name = ?2, price = ?3
             WHERE league_id = ?4 AND team_id = ?5 AND slot_index = ?6",
            params![
                player.id,
                player.name,
                price,
                league_id,
                team_id,
                slot_index as i64
            ],
        )
        .context("failed to assign player to roster slot")?;
        Ok(true)
    }

    /// Manually drop a player from a team's roster, recording a ledger row.
    /// This is the "live user action" path that batches race against.
    /// Returns `false` when the player is not on the team's roster.
    pub fn drop_player(
        &self,
        league_id: &str,
        team_id: &str,
        player_id: &str,
        period: &str,
    ) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin drop transaction")?;

        let freed: Option<u32> = tx
            .query_row(
                "SELECT price FROM roster_slots
                 WHERE league_id = ?1 AND team_id = ?2 AND player_id = ?3",
                params![league_id, team_id, player_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .context("failed to look up dropped player")?;

        let Some(price) = freed else {
            return Ok(false);
        };

        tx.execute(
            "UPDATE roster_slots SET player_id = NULL, player_name = NULL, price = 0
             WHERE league_id = ?1 AND team_id = ?2 AND player_id = ?3",
            params![league_id, team_id, player_id],
        )
        .context("failed to vacate roster slot")?;
        tx.execute(
            "INSERT INTO transactions
                (league_id, period, team_id, player_id, price, kind, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'drop', ?6)",
            params![league_id, period, team_id, player_id, price, now_str()],
        )
        .context("failed to record drop transaction")?;

        tx.commit().context("failed to commit drop")?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Settlement
    // ------------------------------------------------------------------

    /// Commit a winning bid: drop the declared releases, place the subject
    /// player at the settled price, write ledger and winner rows, rotate
    /// waiver priority for waiver claims, and mark the bid processed, all
    /// in one transaction. A mid-failure leaves no partial roster mutation.
    ///
    /// The winners primary key is the backstop against double-award: a
    /// conflicting insert rolls everything back and reports a
    /// [`SettlementWrite::Conflict`] instead of failing the batch.
    pub fn settle_winner(
        &self,
        bid: &Bid,
        player: &PoolPlayer,
        period: &str,
    ) -> Result<SettlementWrite> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin settlement transaction")?;

        // Guard in SQL: the bid must still be pending.
        let claimed = tx
            .execute(
                "UPDATE bids SET processed_at = ?1, outcome = ?2
                 WHERE id = ?3 AND processed_at IS NULL AND cancelled_at IS NULL",
                params![now_str(), BidOutcome::Committed.as_str(), bid.id],
            )
            .context("failed to mark winning bid processed")?;
        if claimed == 0 {
            return Ok(SettlementWrite::Conflict(
                "bid no longer pending".to_string(),
            ));
        }

        // Unique (league, period, player): the double-award backstop.
        let inserted = tx.execute(
            "INSERT INTO winners
                (league_id, period, player_id, bid_id, team_id, price, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                bid.league_id,
                period,
                bid.subject_player_id,
                bid.id,
                bid.claimant_team_id,
                bid.bid_amount,
                now_str(),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Ok(SettlementWrite::Conflict(
                    "player already awarded this period".to_string(),
                ));
            }
            Err(e) => return Err(e).context("failed to record winner"),
        }

        // Drop the declared releases.
        for release_id in &bid.release_player_ids {
            let freed: Option<u32> = tx
                .query_row(
                    "SELECT price FROM roster_slots
                     WHERE league_id = ?1 AND team_id = ?2 AND player_id = ?3",
                    params![bid.league_id, bid.claimant_team_id, release_id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })
                .context("failed to look up release player")?;
            let Some(price) = freed else {
                return Ok(SettlementWrite::Conflict(
                    "release players unavailable".to_string(),
                ));
            };
            tx.execute(
                "UPDATE roster_slots SET player_id = NULL, player_name = NULL, price = 0
                 WHERE league_id = ?1 AND team_id = ?2 AND player_id = ?3",
                params![bid.league_id, bid.claimant_team_id, release_id],
            )
            .context("failed to vacate release slot")?;
            tx.execute(
                "INSERT INTO transactions
                    (league_id, period, team_id, player_id, price, kind, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'drop', ?6)",
                params![
                    bid.league_id,
                    period,
                    bid.claimant_team_id,
                    release_id,
                    price,
                    now_str()
                ],
            )
            .context("failed to record release transaction")?;
        }

        // An RFA subject may still sit on the incumbent's roster; the award
        // moves the player, so vacate the old slot first. This also turns an
        // incumbent re-signing into a vacate-then-place at the new price.
        let held: Option<(String, u32)> = tx
            .query_row(
                "SELECT team_id, price FROM roster_slots
                 WHERE league_id = ?1 AND player_id = ?2",
                params![bid.league_id, bid.subject_player_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .context("failed to look up subject player's roster slot")?;
        if let Some((holder, price)) = held {
            tx.execute(
                "UPDATE roster_slots SET player_id = NULL, player_name = NULL, price = 0
                 WHERE league_id = ?1 AND player_id = ?2",
                params![bid.league_id, bid.subject_player_id],
            )
            .context("failed to vacate subject player's slot")?;
            tx.execute(
                "INSERT INTO transactions
                    (league_id, period, team_id, player_id, price, kind, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'drop', ?6)",
                params![
                    bid.league_id,
                    period,
                    holder,
                    bid.subject_player_id,
                    price,
                    now_str()
                ],
            )
            .context("failed to record subject vacate transaction")?;
        }

        // Place the subject player.
        let snapshot = load_snapshot(&tx, &bid.league_id, &bid.claimant_team_id, 0)?;
        let Some(slot_index) = snapshot.slot_for(player.position) else {
            return Ok(SettlementWrite::Conflict("roster is full".to_string()));
        };
        tx.execute(
            "UPDATE roster_slots SET player_id = ?1, player_name = ?2, price = ?3
             WHERE league_id = ?4 AND team_id = ?5 AND slot_index = ?6",
            params![
                player.id,
                player.name,
                bid.bid_amount,
                bid.league_id,
                bid.claimant_team_id,
                slot_index as i64
            ],
        )
        .context("failed to place awarded player")?;

        let kind = match bid.claim_type {
            ClaimType::Waiver => "waiver_award",
            ClaimType::RestrictedFreeAgency => "rfa_award",
            ClaimType::Transition => "transition_award",
        };
        tx.execute(
            "INSERT INTO transactions
                (league_id, period, team_id, player_id, price, kind, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                bid.league_id,
                period,
                bid.claimant_team_id,
                bid.subject_player_id,
                bid.bid_amount,
                kind,
                now_str()
            ],
        )
        .context("failed to record award transaction")?;

        // Successful waiver claims rotate the claimant to the back.
        if bid.claim_type == ClaimType::Waiver {
            tx.execute(
                "UPDATE waiver_priority
                 SET priority = (SELECT COALESCE(MAX(priority), 0) + 1
                                 FROM waiver_priority WHERE league_id = ?1)
                 WHERE league_id = ?1 AND team_id = ?2",
                params![bid.league_id, bid.claimant_team_id],
            )
            .context("failed to rotate waiver priority")?;
        }

        tx.commit().context("failed to commit settlement")?;
        Ok(SettlementWrite::Committed)
    }

    // ------------------------------------------------------------------
    // Transactions ledger
    // ------------------------------------------------------------------

    /// A team's ledger history, oldest first.
    pub fn transactions_for_team(
        &self,
        league_id: &str,
        team_id: &str,
    ) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, league_id, period, team_id, player_id, price, kind, recorded_at
                 FROM transactions
                 WHERE league_id = ?1 AND team_id = ?2
                 ORDER BY id",
            )
            .context("failed to prepare transactions query")?;
        let rows = stmt
            .query_map(params![league_id, team_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .context("failed to query transactions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map transaction rows")?;

        rows.into_iter()
            .map(|(id, league_id, period, team_id, player_id, price, kind, ts)| {
                Ok(TransactionRecord {
                    id,
                    league_id,
                    period,
                    team_id,
                    player_id,
                    price,
                    kind,
                    recorded_at: parse_ts(&ts)?,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Job runs
    // ------------------------------------------------------------------

    /// Record the start of a batch-job invocation; returns the run id.
    pub fn start_job_run(&self, league_id: &str, claim_type: ClaimType) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO job_runs (league_id, claim_type, started_at)
             VALUES (?1, ?2, ?3)",
            params![league_id, claim_type.as_str(), now_str()],
        )
        .context("failed to record job run start")?;
        Ok(conn.last_insert_rowid())
    }

    /// Record the end of a batch-job invocation.
    pub fn finish_job_run(&self, run_id: i64, status: &str, error: Option<&str>) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE job_runs SET finished_at = ?1, status = ?2, error = ?3 WHERE id = ?4",
            params![now_str(), status, error, run_id],
        )
        .context("failed to record job run finish")?;
        Ok(())
    }

    /// Job runs that did not complete: failed runs, and runs left in the
    /// `running` state by a crash. Logged at startup for operator review.
    pub fn incomplete_job_runs(&self) -> Result<Vec<JobRun>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, league_id, claim_type, status, error FROM job_runs
                 WHERE status != 'completed' ORDER BY id",
            )
            .context("failed to prepare job run query")?;
        let runs = stmt
            .query_map([], |row| {
                Ok(JobRun {
                    id: row.get(0)?,
                    league_id: row.get(1)?,
                    claim_type: row.get(2)?,
                    status: row.get(3)?,
                    error: row.get(4)?,
                })
            })
            .context("failed to query job runs")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map job run rows")?;
        Ok(runs)
    }
}

// ---------------------------------------------------------------------------
// Row mapping helpers
// ---------------------------------------------------------------------------

const BID_COLUMNS: &str = "SELECT id, league_id, claim_type, claimant_team_id,
    subject_player_id, bid_amount, incumbent_team_id, release_player_ids,
    submitted_at, cancelled_at, processed_at, outcome, reason FROM bids";

type RawBidRow = (
    i64,
    String,
    String,
    String,
    String,
    u32,
    Option<String>,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn row_to_bid_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawBidRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    ))
}

fn raw_to_bid(raw: RawBidRow) -> Result<Bid> {
    let (
        id,
        league_id,
        claim_type,
        claimant_team_id,
        subject_player_id,
        bid_amount,
        incumbent_team_id,
        releases_json,
        submitted_at,
        cancelled_at,
        processed_at,
        outcome,
        reason,
    ) = raw;

    let claim_type = ClaimType::from_str_type(&claim_type)
        .with_context(|| format!("unknown claim type in database: {claim_type}"))?;
    let outcome = match outcome {
        Some(s) => Some(
            BidOutcome::from_str_outcome(&s)
                .with_context(|| format!("unknown bid outcome in database: {s}"))?,
        ),
        None => None,
    };
    let release_player_ids: Vec<String> = serde_json::from_str(&releases_json)
        .context("failed to deserialize release_player_ids")?;

    Ok(Bid {
        id,
        league_id,
        claim_type,
        claimant_team_id,
        subject_player_id,
        bid_amount,
        incumbent_team_id,
        release_player_ids,
        submitted_at: parse_ts(&submitted_at)?,
        cancelled_at: cancelled_at.as_deref().map(parse_ts).transpose()?,
        processed_at: processed_at.as_deref().map(parse_ts).transpose()?,
        outcome,
        reason,
    })
}

fn row_to_pool_player(row: &rusqlite::Row<'_>) -> rusqlite::Result<PoolPlayer> {
    let position_str: String = row.get(2)?;
    let position = Position::from_str_pos(&position_str).unwrap_or(Position::Bench);
    Ok(PoolPlayer {
        id: row.get(0)?,
        name: row.get(1)?,
        position,
        projected_points: row.get(3)?,
        cost: row.get::<_, i64>(4)? as u32,
    })
}

/// Load a team's roster from `roster_slots`, usable inside or outside a
/// transaction (`Transaction` derefs to `Connection`).
fn load_snapshot(
    conn: &Connection,
    league_id: &str,
    team_id: &str,
    salary_cap: u32,
) -> Result<RosterSnapshot> {
    let mut stmt = conn
        .prepare(
            "SELECT position, player_id, player_name, price FROM roster_slots
             WHERE league_id = ?1 AND team_id = ?2
             ORDER BY slot_index",
        )
        .context("failed to prepare roster snapshot query")?;
    let slots = stmt
        .query_map(params![league_id, team_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, u32>(3)?,
            ))
        })
        .context("failed to query roster slots")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map roster slot rows")?;

    let slots = slots
        .into_iter()
        .map(|(pos_str, player_id, player_name, price)| {
            let position = Position::from_str_pos(&pos_str)
                .with_context(|| format!("unknown slot position in database: {pos_str}"))?;
            let player = player_id.map(|id| RosteredPlayer {
                name: player_name.unwrap_or_else(|| id.clone()),
                player_id: id,
                // The slot's designation stands in for the player's own
                // position; settlement always re-reads the players table
                // when it needs the real one.
                position,
                price,
            });
            Ok(RosterSlot { position, player })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RosterSnapshot {
        team_id: team_id.to_string(),
        slots,
        salary_cap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAGUE: &str = "league_1";
    const PERIOD: &str = "2026-W32";

    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn roster_config() -> HashMap<String, usize> {
        let mut m = HashMap::new();
        m.insert("QB".into(), 1);
        m.insert("RB".into(), 2);
        m.insert("WR".into(), 2);
        m.insert("TE".into(), 1);
        m.insert("FLEX".into(), 1);
        m.insert("BE".into(), 3);
        m.insert("IR".into(), 1);
        m
    }

    fn teams() -> Vec<String> {
        (1..=4).map(|i| format!("team_{i}")).collect()
    }

    fn seeded_db() -> Database {
        let db = test_db();
        db.seed_league(LEAGUE, &teams(), &roster_config()).unwrap();
        db
    }

    fn pool_player(id: &str, pos: Position, points: f64, cost: u32) -> PoolPlayer {
        PoolPlayer {
            id: id.to_string(),
            name: format!("Player {id}"),
            position: pos,
            projected_points: points,
            cost,
        }
    }

    fn new_bid(team: &str, player: &str, amount: u32) -> NewBid {
        NewBid {
            league_id: LEAGUE.to_string(),
            claim_type: ClaimType::Waiver,
            claimant_team_id: team.to_string(),
            subject_player_id: player.to_string(),
            bid_amount: amount,
            incumbent_team_id: None,
            release_player_ids: vec![],
        }
    }

    // ------------------------------------------------------------------
    // Schema / open
    // ------------------------------------------------------------------

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in [
            "players",
            "bids",
            "roster_slots",
            "waiver_priority",
            "winners",
            "transactions",
            "job_runs",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    #[test]
    fn seed_league_creates_slots_and_priority() {
        let db = seeded_db();
        let snapshot = db.roster_snapshot(LEAGUE, "team_1", 200).unwrap();
        // QB(1)+RB(2)+WR(2)+TE(1)+FLEX(1)+BE(3)+IR(1) = 11 slots
        assert_eq!(snapshot.slots.len(), 11);
        assert_eq!(snapshot.filled_count(), 0);

        let priorities = db.waiver_priorities(LEAGUE).unwrap();
        assert_eq!(priorities.len(), 4);
        assert_eq!(priorities["team_1"], 1);
        assert_eq!(priorities["team_4"], 4);
    }

    #[test]
    fn seed_league_is_idempotent() {
        let db = seeded_db();
        let player = pool_player("p1", Position::RunningBack, 100.0, 10);
        db.upsert_player(&player).unwrap();
        db.assign_player(LEAGUE, "team_1", &player, 10).unwrap();

        // Re-seeding must not wipe existing assignments or priorities.
        db.seed_league(LEAGUE, &teams(), &roster_config()).unwrap();
        let snapshot = db.roster_snapshot(LEAGUE, "team_1", 200).unwrap();
        assert!(snapshot.contains("p1"));
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    #[test]
    fn upsert_player_roundtrip_and_update() {
        let db = test_db();
        db.upsert_player(&pool_player("p1", Position::Quarterback, 250.0, 40))
            .unwrap();
        let p = db.player("p1").unwrap().unwrap();
        assert_eq!(p.position, Position::Quarterback);
        assert_eq!(p.cost, 40);

        db.upsert_player(&pool_player("p1", Position::Quarterback, 260.0, 45))
            .unwrap();
        let p = db.player("p1").unwrap().unwrap();
        assert_eq!(p.cost, 45);

        assert!(db.player("nonexistent").unwrap().is_none());
    }

    #[test]
    fn free_agent_pool_excludes_rostered() {
        let db = seeded_db();
        let fa = pool_player("p1", Position::RunningBack, 120.0, 10);
        let taken = pool_player("p2", Position::RunningBack, 110.0, 8);
        db.import_pool(&[fa.clone(), taken.clone()]).unwrap();
        db.assign_player(LEAGUE, "team_1", &taken, 8).unwrap();

        let pool = db.free_agent_pool(LEAGUE).unwrap();
        let ids: Vec<&str> = pool.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1"]);
    }

    // ------------------------------------------------------------------
    // Bids
    // ------------------------------------------------------------------

    #[test]
    fn submit_and_load_bid_roundtrip() {
        let db = test_db();
        let mut nb = new_bid("team_1", "p1", 12);
        nb.release_player_ids = vec!["p8".to_string(), "p9".to_string()];
        let id = db.submit_bid(&nb).unwrap();

        let bid = db.bid(id).unwrap().unwrap();
        assert_eq!(bid.claimant_team_id, "team_1");
        assert_eq!(bid.subject_player_id, "p1");
        assert_eq!(bid.bid_amount, 12);
        assert_eq!(bid.release_player_ids, vec!["p8", "p9"]);
        assert!(bid.is_pending());
        assert!(bid.outcome.is_none());
    }

    #[test]
    fn submit_bid_rejects_invalid_shape() {
        let db = test_db();
        let mut nb = new_bid("team_1", "", 12);
        nb.subject_player_id.clear();
        assert!(db.submit_bid(&nb).is_err());
    }

    #[test]
    fn cancel_bid_only_while_pending() {
        let db = test_db();
        let id = db.submit_bid(&new_bid("team_1", "p1", 5)).unwrap();
        assert!(db.cancel_bid(id).unwrap());
        // Second cancel is a no-op
        assert!(!db.cancel_bid(id).unwrap());

        let bid = db.bid(id).unwrap().unwrap();
        assert!(bid.cancelled_at.is_some());
        assert!(!bid.is_pending());
    }

    #[test]
    fn cancel_processed_bid_is_refused() {
        let db = test_db();
        let id = db.submit_bid(&new_bid("team_1", "p1", 5)).unwrap();
        db.mark_processed(id, BidOutcome::Lost, None).unwrap();
        assert!(!db.cancel_bid(id).unwrap());
        let bid = db.bid(id).unwrap().unwrap();
        assert!(bid.cancelled_at.is_none());
    }

    #[test]
    fn processed_bid_is_immutable() {
        let db = test_db();
        let id = db.submit_bid(&new_bid("team_1", "p1", 5)).unwrap();
        db.mark_processed(id, BidOutcome::Lost, Some("outbid"))
            .unwrap();
        // A second mark does not overwrite the outcome.
        db.mark_processed(id, BidOutcome::Committed, None).unwrap();

        let bid = db.bid(id).unwrap().unwrap();
        assert_eq!(bid.outcome, Some(BidOutcome::Lost));
        assert_eq!(bid.reason.as_deref(), Some("outbid"));
    }

    #[test]
    fn pending_bids_filters_by_type_and_state() {
        let db = test_db();
        let a = db.submit_bid(&new_bid("team_1", "p1", 5)).unwrap();
        let b = db.submit_bid(&new_bid("team_2", "p2", 8)).unwrap();
        let mut rfa = new_bid("team_3", "p3", 6);
        rfa.claim_type = ClaimType::RestrictedFreeAgency;
        rfa.incumbent_team_id = Some("team_1".to_string());
        db.submit_bid(&rfa).unwrap();
        db.cancel_bid(a).unwrap();

        let pending = db.pending_bids(LEAGUE, ClaimType::Waiver).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b);

        let pending_rfa = db
            .pending_bids(LEAGUE, ClaimType::RestrictedFreeAgency)
            .unwrap();
        assert_eq!(pending_rfa.len(), 1);
        assert_eq!(pending_rfa[0].subject_player_id, "p3");
    }

    // ------------------------------------------------------------------
    // Roster mutation
    // ------------------------------------------------------------------

    #[test]
    fn assign_and_drop_player() {
        let db = seeded_db();
        let player = pool_player("p1", Position::WideReceiver, 90.0, 14);
        db.upsert_player(&player).unwrap();

        assert!(db.assign_player(LEAGUE, "team_2", &player, 14).unwrap());
        assert_eq!(
            db.rostered_by(LEAGUE, "p1").unwrap(),
            Some("team_2".to_string())
        );

        assert!(db.drop_player(LEAGUE, "team_2", "p1", PERIOD).unwrap());
        assert_eq!(db.rostered_by(LEAGUE, "p1").unwrap(), None);
        // Dropping again reports not-found
        assert!(!db.drop_player(LEAGUE, "team_2", "p1", PERIOD).unwrap());

        let ledger = db.transactions_for_team(LEAGUE, "team_2").unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, "drop");
        assert_eq!(ledger[0].price, 14);
    }

    // ------------------------------------------------------------------
    // Settlement
    // ------------------------------------------------------------------

    fn committed_waiver_bid(db: &Database, team: &str, player: &PoolPlayer, amount: u32) -> i64 {
        db.upsert_player(player).unwrap();
        let id = db.submit_bid(&new_bid(team, &player.id, amount)).unwrap();
        let bid = db.bid(id).unwrap().unwrap();
        let write = db.settle_winner(&bid, player, PERIOD).unwrap();
        assert_eq!(write, SettlementWrite::Committed);
        id
    }

    #[test]
    fn settle_winner_places_player_and_writes_ledger() {
        let db = seeded_db();
        let player = pool_player("p1", Position::RunningBack, 150.0, 20);
        let id = committed_waiver_bid(&db, "team_1", &player, 7);

        let snapshot = db.roster_snapshot(LEAGUE, "team_1", 200).unwrap();
        assert!(snapshot.contains("p1"));
        assert_eq!(snapshot.spent(), 7);

        let bid = db.bid(id).unwrap().unwrap();
        assert_eq!(bid.outcome, Some(BidOutcome::Committed));
        assert!(bid.processed_at.is_some());

        let ledger = db.transactions_for_team(LEAGUE, "team_1").unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, "waiver_award");
        assert_eq!(ledger[0].price, 7);

        let winners = db.winners_for_period(LEAGUE, PERIOD).unwrap();
        assert!(winners.contains("p1"));
    }

    #[test]
    fn settle_winner_drops_releases_first() {
        let db = seeded_db();
        let old = pool_player("old", Position::RunningBack, 80.0, 30);
        db.upsert_player(&old).unwrap();
        db.assign_player(LEAGUE, "team_1", &old, 30).unwrap();

        let incoming = pool_player("new", Position::RunningBack, 120.0, 25);
        db.upsert_player(&incoming).unwrap();
        let mut nb = new_bid("team_1", "new", 9);
        nb.release_player_ids = vec!["old".to_string()];
        let id = db.submit_bid(&nb).unwrap();
        let bid = db.bid(id).unwrap().unwrap();

        let write = db.settle_winner(&bid, &incoming, PERIOD).unwrap();
        assert_eq!(write, SettlementWrite::Committed);

        let snapshot = db.roster_snapshot(LEAGUE, "team_1", 200).unwrap();
        assert!(!snapshot.contains("old"));
        assert!(snapshot.contains("new"));

        let ledger = db.transactions_for_team(LEAGUE, "team_1").unwrap();
        let kinds: Vec<&str> = ledger.iter().map(|t| t.kind.as_str()).collect();
        assert_eq!(kinds, vec!["drop", "waiver_award"]);
    }

    // The winners primary key forbids a second award.
    #[test]
    fn settle_winner_double_award_conflicts() {
        let db = seeded_db();
        let player = pool_player("p1", Position::RunningBack, 150.0, 20);
        committed_waiver_bid(&db, "team_1", &player, 7);

        let rival_id = db.submit_bid(&new_bid("team_2", "p1", 9)).unwrap();
        let rival = db.bid(rival_id).unwrap().unwrap();
        let write = db.settle_winner(&rival, &player, PERIOD).unwrap();
        assert_eq!(
            write,
            SettlementWrite::Conflict("player already awarded this period".to_string())
        );

        // The conflicting settlement rolled back entirely: the rival bid is
        // still pending and team_2's roster is untouched.
        let rival = db.bid(rival_id).unwrap().unwrap();
        assert!(rival.is_pending());
        assert_eq!(
            db.roster_snapshot(LEAGUE, "team_2", 200).unwrap().filled_count(),
            0
        );
    }

    #[test]
    fn settle_winner_cancelled_bid_conflicts() {
        let db = seeded_db();
        let player = pool_player("p1", Position::RunningBack, 150.0, 20);
        db.upsert_player(&player).unwrap();
        let id = db.submit_bid(&new_bid("team_1", "p1", 7)).unwrap();
        let bid = db.bid(id).unwrap().unwrap();

        // Cancelled between selection and settlement.
        db.cancel_bid(id).unwrap();
        let write = db.settle_winner(&bid, &player, PERIOD).unwrap();
        assert_eq!(
            write,
            SettlementWrite::Conflict("bid no longer pending".to_string())
        );
        assert!(db.winners_for_period(LEAGUE, PERIOD).unwrap().is_empty());
    }

    #[test]
    fn settle_winner_missing_release_rolls_back() {
        let db = seeded_db();
        let player = pool_player("p1", Position::RunningBack, 150.0, 20);
        db.upsert_player(&player).unwrap();
        let mut nb = new_bid("team_1", "p1", 7);
        nb.release_player_ids = vec!["gone".to_string()];
        let id = db.submit_bid(&nb).unwrap();
        let bid = db.bid(id).unwrap().unwrap();

        let write = db.settle_winner(&bid, &player, PERIOD).unwrap();
        assert_eq!(
            write,
            SettlementWrite::Conflict("release players unavailable".to_string())
        );
        // Rolled back: bid still pending, nothing awarded.
        assert!(db.bid(id).unwrap().unwrap().is_pending());
        assert!(db.winners_for_period(LEAGUE, PERIOD).unwrap().is_empty());
    }

    #[test]
    fn settle_winner_full_roster_conflicts() {
        let db = test_db();
        let mut tiny = HashMap::new();
        tiny.insert("RB".to_string(), 1);
        db.seed_league(LEAGUE, &teams(), &tiny).unwrap();

        let first = pool_player("p1", Position::RunningBack, 100.0, 10);
        db.upsert_player(&first).unwrap();
        db.assign_player(LEAGUE, "team_1", &first, 10).unwrap();

        let second = pool_player("p2", Position::RunningBack, 90.0, 8);
        db.upsert_player(&second).unwrap();
        let id = db.submit_bid(&new_bid("team_1", "p2", 4)).unwrap();
        let bid = db.bid(id).unwrap().unwrap();

        let write = db.settle_winner(&bid, &second, PERIOD).unwrap();
        assert_eq!(write, SettlementWrite::Conflict("roster is full".to_string()));
        assert!(db.bid(id).unwrap().unwrap().is_pending());
    }

    #[test]
    fn waiver_priority_rotates_only_on_success() {
        let db = seeded_db();
        let player = pool_player("p1", Position::RunningBack, 150.0, 20);
        committed_waiver_bid(&db, "team_1", &player, 7);

        let priorities = db.waiver_priorities(LEAGUE).unwrap();
        // team_1 moved behind everyone (max 4 -> 5); others unchanged.
        assert_eq!(priorities["team_1"], 5);
        assert_eq!(priorities["team_2"], 2);
        assert_eq!(priorities["team_3"], 3);
        assert_eq!(priorities["team_4"], 4);
    }

    #[test]
    fn rfa_award_does_not_rotate_priority() {
        let db = seeded_db();
        let player = pool_player("p1", Position::RunningBack, 150.0, 20);
        db.upsert_player(&player).unwrap();
        let mut nb = new_bid("team_1", "p1", 7);
        nb.claim_type = ClaimType::RestrictedFreeAgency;
        nb.incumbent_team_id = Some("team_2".to_string());
        let id = db.submit_bid(&nb).unwrap();
        let bid = db.bid(id).unwrap().unwrap();
        assert_eq!(
            db.settle_winner(&bid, &player, PERIOD).unwrap(),
            SettlementWrite::Committed
        );

        let priorities = db.waiver_priorities(LEAGUE).unwrap();
        assert_eq!(priorities["team_1"], 1);

        let ledger = db.transactions_for_team(LEAGUE, "team_1").unwrap();
        assert_eq!(ledger[0].kind, "rfa_award");
    }

    // ------------------------------------------------------------------
    // Job runs
    // ------------------------------------------------------------------

    #[test]
    fn job_run_lifecycle() {
        let db = test_db();
        let id = db.start_job_run(LEAGUE, ClaimType::Waiver).unwrap();
        assert_eq!(db.incomplete_job_runs().unwrap().len(), 1);

        db.finish_job_run(id, "completed", None).unwrap();
        assert!(db.incomplete_job_runs().unwrap().is_empty());

        let id2 = db.start_job_run(LEAGUE, ClaimType::Waiver).unwrap();
        db.finish_job_run(id2, "failed", Some("database unreachable"))
            .unwrap();
        let incomplete = db.incomplete_job_runs().unwrap();
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].status, "failed");
        assert_eq!(incomplete[0].error.as_deref(), Some("database unreachable"));
    }
}
