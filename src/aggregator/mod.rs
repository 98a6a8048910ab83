pub mod conditions;
pub mod rain;
pub mod staleness;

pub use conditions::ConditionsAggregator;
pub use staleness::StalenessGuard;
