// Player pool loading from projection CSVs.
//
// Reads a simple pool CSV with one row per player: id, name, position,
// projected points, and auction cost. Malformed rows are skipped with a
// warning rather than failing the whole import.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::roster::Position;

/// A player available to the auction optimizer.
#[derive(Debug, Clone)]
pub struct PoolPlayer {
    pub id: String,
    pub name: String,
    pub position: Position,
    pub projected_points: f64,
    /// Expected auction cost in league dollars.
    pub cost: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("failed to read pool file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

/// Raw pool CSV row. Points and cost are f64 because projection sources use
/// fractional values; both are rounded on load.
#[derive(Debug, Deserialize)]
struct RawPoolRow {
    id: String,
    name: String,
    position: String,
    projected_points: f64,
    cost: f64,
}

fn load_pool_from_reader<R: Read>(rdr: R) -> Result<Vec<PoolPlayer>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut players = Vec::new();
    for result in reader.deserialize::<RawPoolRow>() {
        match result {
            Ok(raw) => {
                if !raw.projected_points.is_finite() || !raw.cost.is_finite() || raw.cost < 0.0 {
                    warn!(
                        "skipping pool player '{}': non-finite or negative values",
                        raw.name.trim()
                    );
                    continue;
                }
                let position = match Position::from_str_pos(raw.position.trim()) {
                    Some(pos) if !pos.is_meta_slot() => pos,
                    _ => {
                        warn!(
                            "skipping pool player '{}': unknown position '{}'",
                            raw.name.trim(),
                            raw.position
                        );
                        continue;
                    }
                };
                players.push(PoolPlayer {
                    id: raw.id.trim().to_string(),
                    name: raw.name.trim().to_string(),
                    position,
                    projected_points: raw.projected_points,
                    cost: raw.cost.round() as u32,
                });
            }
            Err(e) => {
                warn!("skipping malformed pool row: {}", e);
            }
        }
    }
    Ok(players)
}

/// Load the player pool from a CSV file at `path`.
pub fn load_pool(path: &Path) -> Result<Vec<PoolPlayer>, PoolError> {
    let file = std::fs::File::open(path).map_err(|e| PoolError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_pool_from_reader(file).map_err(|e| PoolError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_pool_basic() {
        let csv = "id,name,position,projected_points,cost\n\
                   101,Alpha Back,RB,180.4,45\n\
                   102,Beta Receiver,WR,150.0,30.6\n";
        let players = load_pool_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].id, "101");
        assert_eq!(players[0].position, Position::RunningBack);
        assert_eq!(players[1].cost, 31); // 30.6 rounds to 31
    }

    #[test]
    fn load_pool_skips_unknown_position() {
        let csv = "id,name,position,projected_points,cost\n\
                   101,Alpha Back,XX,180.4,45\n\
                   102,Beta Receiver,WR,150.0,30\n";
        let players = load_pool_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, "102");
    }

    #[test]
    fn load_pool_skips_meta_slot_position() {
        let csv = "id,name,position,projected_points,cost\n\
                   101,Bench Guy,BE,10.0,1\n";
        let players = load_pool_from_reader(csv.as_bytes()).unwrap();
        assert!(players.is_empty());
    }

    #[test]
    fn load_pool_skips_non_finite_values() {
        let csv = "id,name,position,projected_points,cost\n\
                   101,Alpha Back,RB,NaN,45\n\
                   102,Beta Receiver,WR,150.0,30\n";
        let players = load_pool_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(players.len(), 1);
    }

    #[test]
    fn load_pool_skips_malformed_rows() {
        let csv = "id,name,position,projected_points,cost\n\
                   101,Alpha Back,RB,not_a_number,45\n\
                   102,Beta Receiver,WR,150.0,30\n";
        let players = load_pool_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, "102");
    }

    #[test]
    fn load_pool_empty_file_is_empty() {
        let csv = "id,name,position,projected_points,cost\n";
        let players = load_pool_from_reader(csv.as_bytes()).unwrap();
        assert!(players.is_empty());
    }
}
