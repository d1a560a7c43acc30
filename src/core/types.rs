use serde::Serialize;

/// Annual fraction of savings assumed sustainably spendable in retirement.
pub const SAFE_WITHDRAWAL_RATE: f64 = 0.04;

/// Simulated years after which a projection is reported as non-convergent.
pub const MAX_HORIZON_YEARS: u32 = 200;

pub const RATE_RANGE: (f64, f64) = (0.0, 100.0);
pub const RETURN_RANGE: (f64, f64) = (0.0, 100.0);

/// Bounds the investment-return stepper enforces on user input.
pub const UI_RETURN_RANGE: (f64, f64) = (2.0, 12.0);
pub const UI_RETURN_STEP: f64 = 0.1;

pub const DEFAULT_MONTHLY_INCOME: f64 = 5_000.0;
pub const DEFAULT_MONTHLY_EXPENSES: f64 = 1_500.0;
pub const DEFAULT_INVESTMENT_RETURN: f64 = 9.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum EditEvent {
    IncomeEdited(f64),
    ExpensesImplied(f64),
    RateEdited(f64),
}

/// Income, expenses and savings rate, of which only two are independent at
/// any moment. The target invariant is
/// `monthly_expenses == monthly_income * (1 - savings_rate / 100)`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialProfile {
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub savings_rate: f64,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ProjectionInput {
    pub monthly_income: f64,
    pub savings_rate: f64,
    pub investment_return_percent: f64,
}

impl ProjectionInput {
    pub fn from_profile(profile: &FinancialProfile, investment_return_percent: f64) -> Self {
        Self {
            monthly_income: profile.monthly_income,
            savings_rate: profile.savings_rate,
            investment_return_percent,
        }
    }

    pub fn monthly_expenses(&self) -> f64 {
        self.monthly_income * (1.0 - self.savings_rate / 100.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub monthly_savings: f64,
    pub years_to_retire: u32,
    pub total_savings_at_retirement: f64,
    pub monthly_spending: f64,
    pub target_savings: f64,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Projection {
    Converged(ProjectionResult),
    NonConvergent {
        horizon_years: u32,
        total_savings_at_horizon: f64,
        target_savings: f64,
    },
}

impl Projection {
    pub fn years_to_retire(&self) -> Option<u32> {
        match self {
            Projection::Converged(result) => Some(result.years_to_retire),
            Projection::NonConvergent { .. } => None,
        }
    }

    pub fn converged(&self) -> Option<&ProjectionResult> {
        match self {
            Projection::Converged(result) => Some(result),
            Projection::NonConvergent { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearTracePoint {
    pub year: u32,
    pub contribution: f64,
    pub growth: f64,
    pub end_balance: f64,
    pub target_progress: f64,
}
