/// Tabular methods, one value estimate per state-action pair
pub mod tabular;
