use super::engine::{SavingsLedger, down_payment};
use super::error::{ProjectionError, require_non_negative, require_positive};
use super::types::{
    RateSearchConfig, RateSearchReport, SearchInputs, SearchIteration, SearchOutcome,
};

/// Rate units per whole salary; one unit is 0.01%.
pub const RATE_UNITS_PER_WHOLE: f64 = 10_000.0;

/// Savings after `config.horizon_months` months when `rate_units` of every
/// monthly salary is put aside.
pub fn simulate_rate(rate_units: u32, starting_salary: f64, config: &RateSearchConfig) -> f64 {
    let portion = rate_units as f64 / RATE_UNITS_PER_WHOLE;
    let mut ledger = SavingsLedger::new(starting_salary);
    for _ in 0..config.horizon_months {
        ledger.advance(portion, config.semi_annual_raise);
    }
    ledger.savings()
}

pub fn search_rate(starting_salary: f64) -> Result<SearchOutcome, ProjectionError> {
    search_rate_with(starting_salary, &RateSearchConfig::default()).map(|report| report.outcome)
}

impl SearchInputs {
    pub fn search(&self, config: &RateSearchConfig) -> Result<RateSearchReport, ProjectionError> {
        search_rate_with(self.starting_salary, config)
    }
}

/// Bisects over integer rate units for a rate whose simulated savings land
/// within `config.tolerance` of the down payment.
///
/// The first probe inside the tolerance band wins. Savings are strictly
/// increasing in the rate, so the search never discards a band it needs, but
/// the returned unit is not necessarily the smallest one in the band.
pub fn search_rate_with(
    starting_salary: f64,
    config: &RateSearchConfig,
) -> Result<RateSearchReport, ProjectionError> {
    require_positive("starting_salary", starting_salary)?;
    validate_config(config)?;

    let target = down_payment(config.total_cost);
    let mut iterations = Vec::new();

    let best_case = simulate_rate(config.max_rate_units, starting_salary, config);
    if best_case < target - config.tolerance {
        tracing::debug!(
            starting_salary,
            best_case,
            target,
            "maximum savings rate falls short, skipping search"
        );
        return Ok(RateSearchReport {
            outcome: SearchOutcome::Infeasible { steps: None },
            iterations,
        });
    }

    let mut low: i64 = 0;
    let mut high = i64::from(config.max_rate_units);
    let mut steps = 0;
    while low <= high {
        steps += 1;
        let mid = (low + high) / 2;
        let rate_units = mid as u32;
        let savings = simulate_rate(rate_units, starting_salary, config);
        iterations.push(SearchIteration {
            step: steps,
            low,
            high,
            rate_units,
            savings,
        });
        tracing::debug!(step = steps, low, high, rate_units, savings, "bisection probe");

        if (savings - target).abs() <= config.tolerance {
            return Ok(RateSearchReport {
                outcome: SearchOutcome::Found {
                    rate: rate_units as f64 / RATE_UNITS_PER_WHOLE,
                    rate_units,
                    steps,
                },
                iterations,
            });
        }

        if savings < target {
            low = mid + 1;
        } else {
            high = mid - 1;
        }
    }

    Ok(RateSearchReport {
        outcome: SearchOutcome::Infeasible { steps: Some(steps) },
        iterations,
    })
}

fn validate_config(config: &RateSearchConfig) -> Result<(), ProjectionError> {
    require_non_negative("total_cost", config.total_cost)?;
    require_non_negative("semi_annual_raise", config.semi_annual_raise)?;
    require_non_negative("tolerance", config.tolerance)?;
    if config.horizon_months == 0 {
        return Err(ProjectionError::invalid(
            "horizon_months",
            "> 0",
            config.horizon_months as f64,
        ));
    }
    if config.max_rate_units == 0 {
        return Err(ProjectionError::invalid(
            "max_rate_units",
            "> 0",
            config.max_rate_units as f64,
        ));
    }
    Ok(())
}
