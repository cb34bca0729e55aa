pub mod audit;
pub mod metrics;
pub mod sparse;
pub mod validate;
