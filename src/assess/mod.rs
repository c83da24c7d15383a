pub mod heuristic;
pub mod normalize;
pub mod prompt;
pub mod schema;
pub mod scorer;
