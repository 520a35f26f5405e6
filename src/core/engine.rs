use super::error::{ProjectionError, require_fraction, require_non_negative, require_positive};
use super::types::{MonthRecord, SavingsInputs};

pub const ANNUAL_RETURN: f64 = 0.04;
pub const MONTHLY_RETURN: f64 = ANNUAL_RETURN / 12.0;
pub const DOWN_PAYMENT_PORTION: f64 = 0.25;
pub const MONTHS_PER_RAISE: u32 = 6;
/// Projections give up after 500 years of saving.
pub const MAX_PROJECTION_MONTHS: u32 = 6_000;

/// One month of growth: interest on the opening balance, then the deposit.
pub fn accrue_month(savings: f64, contribution: f64) -> f64 {
    let grown = savings + savings * MONTHLY_RETURN;
    grown + contribution
}

pub fn down_payment(total_cost: f64) -> f64 {
    total_cost * DOWN_PAYMENT_PORTION
}

/// Running state of a savings account whose contribution is a share of a
/// salary that may be raised every [`MONTHS_PER_RAISE`] months.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SavingsLedger {
    savings: f64,
    monthly_salary: f64,
    month: u32,
}

impl SavingsLedger {
    pub(crate) fn new(annual_salary: f64) -> Self {
        Self {
            savings: 0.0,
            monthly_salary: annual_salary / 12.0,
            month: 0,
        }
    }

    pub(crate) fn savings(&self) -> f64 {
        self.savings
    }

    pub(crate) fn month(&self) -> u32 {
        self.month
    }

    pub(crate) fn advance(&mut self, portion: f64, semi_annual_raise: f64) -> MonthRecord {
        let opening = self.savings;
        let salary_used = self.monthly_salary;
        let contribution = portion * salary_used;

        self.savings = accrue_month(opening, contribution);
        self.month += 1;
        if self.month % MONTHS_PER_RAISE == 0 {
            self.monthly_salary *= 1.0 + semi_annual_raise;
        }

        MonthRecord {
            month: self.month,
            monthly_salary: salary_used,
            interest: opening * MONTHLY_RETURN,
            contribution,
            savings: self.savings,
        }
    }
}

pub fn project_fixed(
    annual_salary: f64,
    portion_saved: f64,
    total_cost: f64,
) -> Result<u32, ProjectionError> {
    SavingsInputs::fixed(annual_salary, portion_saved, total_cost).project()
}

pub fn project_stepped(
    annual_salary: f64,
    portion_saved: f64,
    total_cost: f64,
    semi_annual_raise: f64,
) -> Result<u32, ProjectionError> {
    SavingsInputs::stepped(annual_salary, portion_saved, total_cost, semi_annual_raise).project()
}

impl SavingsInputs {
    /// Months until savings cover the down payment.
    pub fn project(&self) -> Result<u32, ProjectionError> {
        let mut months = 0;
        run_projection(self, |record| months = record.month)?;
        Ok(months)
    }

    pub fn validate(&self) -> Result<(), ProjectionError> {
        require_positive("annual_salary", self.annual_salary)?;
        require_fraction("portion_saved", self.portion_saved)?;
        require_non_negative("total_cost", self.total_cost)?;
        if let Some(raise) = self.semi_annual_raise {
            require_non_negative("semi_annual_raise", raise)?;
        }
        Ok(())
    }
}

/// Month-by-month ledger of a projection, ending with the month the target
/// is reached.
pub fn trace_savings(inputs: &SavingsInputs) -> Result<Vec<MonthRecord>, ProjectionError> {
    let mut records = Vec::new();
    run_projection(inputs, |record| records.push(record))?;
    Ok(records)
}

fn run_projection(
    inputs: &SavingsInputs,
    mut on_month: impl FnMut(MonthRecord),
) -> Result<(), ProjectionError> {
    inputs.validate()?;

    let target = down_payment(inputs.total_cost);
    let raise = inputs.semi_annual_raise.unwrap_or(0.0);
    let mut ledger = SavingsLedger::new(inputs.annual_salary);

    while ledger.savings() < target {
        if ledger.month() >= MAX_PROJECTION_MONTHS {
            tracing::warn!(
                months = ledger.month(),
                savings = ledger.savings(),
                target,
                "projection did not converge"
            );
            return Err(ProjectionError::DidNotConverge {
                months: ledger.month(),
                savings: ledger.savings(),
                target,
            });
        }
        on_month(ledger.advance(inputs.portion_saved, raise));
    }
    Ok(())
}
