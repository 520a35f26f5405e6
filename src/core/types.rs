use serde::Serialize;

/// Which contribution policy a projection follows.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SavingsPolicy {
    Fixed,
    SteppedRaise,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavingsInputs {
    pub annual_salary: f64,
    pub portion_saved: f64,
    pub total_cost: f64,
    /// Fraction added to the salary every six months. `None` keeps the
    /// contribution constant.
    pub semi_annual_raise: Option<f64>,
}

impl SavingsInputs {
    pub fn fixed(annual_salary: f64, portion_saved: f64, total_cost: f64) -> Self {
        Self {
            annual_salary,
            portion_saved,
            total_cost,
            semi_annual_raise: None,
        }
    }

    pub fn stepped(
        annual_salary: f64,
        portion_saved: f64,
        total_cost: f64,
        semi_annual_raise: f64,
    ) -> Self {
        Self {
            annual_salary,
            portion_saved,
            total_cost,
            semi_annual_raise: Some(semi_annual_raise),
        }
    }

    pub fn policy(&self) -> SavingsPolicy {
        match self.semi_annual_raise {
            Some(_) => SavingsPolicy::SteppedRaise,
            None => SavingsPolicy::Fixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchInputs {
    pub starting_salary: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOutcome {
    Found {
        rate: f64,
        rate_units: u32,
        steps: u32,
    },
    /// `steps` is `None` when even the maximum rate falls short and no
    /// bisection was attempted.
    Infeasible { steps: Option<u32> },
}

impl SearchOutcome {
    pub fn steps(&self) -> Option<u32> {
        match *self {
            SearchOutcome::Found { steps, .. } => Some(steps),
            SearchOutcome::Infeasible { steps } => steps,
        }
    }

    pub fn is_feasible(&self) -> bool {
        matches!(self, SearchOutcome::Found { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSearchConfig {
    pub total_cost: f64,
    pub semi_annual_raise: f64,
    pub horizon_months: u32,
    pub tolerance: f64,
    pub max_rate_units: u32,
}

impl Default for RateSearchConfig {
    fn default() -> Self {
        Self {
            total_cost: 1_000_000.0,
            semi_annual_raise: 0.07,
            horizon_months: 36,
            tolerance: 100.0,
            max_rate_units: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRecord {
    pub month: u32,
    pub monthly_salary: f64,
    pub interest: f64,
    pub contribution: f64,
    pub savings: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIteration {
    pub step: u32,
    pub low: i64,
    pub high: i64,
    pub rate_units: u32,
    pub savings: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateSearchReport {
    pub outcome: SearchOutcome,
    pub iterations: Vec<SearchIteration>,
}
