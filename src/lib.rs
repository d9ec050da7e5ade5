// Library root: re-exports all modules so integration tests and external
// consumers can access the crate's public API.

pub mod claim;
pub mod config;
pub mod db;
pub mod job;
pub mod lineup;
pub mod notify;
pub mod roster;
pub mod settle;
