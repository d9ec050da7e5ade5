// Auction lineup optimization: player pool loading and the 0/1 solver.

pub mod optimizer;
pub mod pool;
