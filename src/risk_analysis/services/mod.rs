pub mod matcher;
pub mod risk_aggregator;

pub use matcher::Matcher;
pub use risk_aggregator::{RiskAggregator, RiskThresholds};
