mod duration;
mod engine;
mod error;
mod solver;
mod types;

pub use duration::format_duration;
pub use engine::{
    ANNUAL_RETURN, DOWN_PAYMENT_PORTION, MAX_PROJECTION_MONTHS, MONTHLY_RETURN, MONTHS_PER_RAISE,
    accrue_month, down_payment, project_fixed, project_stepped, trace_savings,
};
pub use error::ProjectionError;
pub use solver::{RATE_UNITS_PER_WHOLE, search_rate, search_rate_with, simulate_rate};
pub use types::{
    MonthRecord, RateSearchConfig, RateSearchReport, SavingsInputs, SavingsPolicy, SearchInputs,
    SearchIteration, SearchOutcome,
};
