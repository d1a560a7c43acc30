use tracing::debug;

use super::error::CalcError;
use super::types::{
    DEFAULT_MONTHLY_EXPENSES, DEFAULT_MONTHLY_INCOME, EditEvent, FinancialProfile, RATE_RANGE,
};

impl FinancialProfile {
    /// Builds a profile from income and expenses, deriving the savings rate.
    pub fn new(monthly_income: f64, monthly_expenses: f64) -> Result<Self, CalcError> {
        check_income(monthly_income)?;
        check_expenses(monthly_expenses)?;
        let mut profile = Self {
            monthly_income,
            monthly_expenses,
            savings_rate: 0.0,
        };
        settle_rate_from_expenses(&mut profile);
        Ok(profile)
    }

    /// Builds a profile from income and savings rate, deriving the expenses.
    pub fn with_savings_rate(monthly_income: f64, savings_rate: f64) -> Result<Self, CalcError> {
        Ok(Self {
            monthly_income,
            monthly_expenses: derive_monthly_expenses(monthly_income, savings_rate)?,
            savings_rate,
        })
    }

    /// Applies `event` in place. On error the profile is left untouched.
    pub fn apply(&mut self, event: EditEvent) -> Result<(), CalcError> {
        *self = resolve(self, event)?;
        Ok(())
    }

    pub fn monthly_savings(&self) -> f64 {
        self.monthly_income * (self.savings_rate / 100.0)
    }
}

impl Default for FinancialProfile {
    fn default() -> Self {
        let mut profile = Self {
            monthly_income: DEFAULT_MONTHLY_INCOME,
            monthly_expenses: DEFAULT_MONTHLY_EXPENSES,
            savings_rate: 0.0,
        };
        settle_rate_from_expenses(&mut profile);
        profile
    }
}

/// Returns the profile that results from applying one edit event.
///
/// Each event runs exactly one derivation pass, chosen by the event kind:
/// income and expense edits re-derive the savings rate with expenses held,
/// rate edits re-derive expenses with income held. No derivation feeds back
/// into another event.
pub fn resolve(profile: &FinancialProfile, event: EditEvent) -> Result<FinancialProfile, CalcError> {
    let mut next = *profile;
    match event {
        EditEvent::IncomeEdited(income) => {
            check_income(income)?;
            check_expenses(profile.monthly_expenses)?;
            next.monthly_income = income;
            settle_rate_from_expenses(&mut next);
        }
        EditEvent::ExpensesImplied(expenses) => {
            check_income(profile.monthly_income)?;
            check_expenses(expenses)?;
            next.monthly_expenses = expenses;
            settle_rate_from_expenses(&mut next);
        }
        EditEvent::RateEdited(rate) => {
            next.monthly_expenses = derive_monthly_expenses(profile.monthly_income, rate)?;
            next.savings_rate = rate;
        }
    }

    debug!(
        ?event,
        income = next.monthly_income,
        expenses = next.monthly_expenses,
        savings_rate = next.savings_rate,
        "resolved profile edit"
    );
    Ok(next)
}

/// Whole-percent savings rate implied by income and expenses, rounded half up.
/// May fall below zero when expenses exceed income.
pub fn derive_savings_rate(monthly_income: f64, monthly_expenses: f64) -> Result<f64, CalcError> {
    check_income(monthly_income)?;
    check_expenses(monthly_expenses)?;
    Ok(round_half_up(
        100.0 * (monthly_income - monthly_expenses) / monthly_income,
    ))
}

pub fn derive_monthly_expenses(monthly_income: f64, savings_rate: f64) -> Result<f64, CalcError> {
    check_income(monthly_income)?;
    check_rate(savings_rate)?;
    Ok(monthly_income * (1.0 - savings_rate / 100.0))
}

// Income and expenses must already be valid.
fn settle_rate_from_expenses(profile: &mut FinancialProfile) {
    let raw = round_half_up(
        100.0 * (profile.monthly_income - profile.monthly_expenses) / profile.monthly_income,
    );
    let rate = raw.clamp(RATE_RANGE.0, RATE_RANGE.1);
    profile.savings_rate = rate;
    if rate != raw {
        profile.monthly_expenses = profile.monthly_income * (1.0 - rate / 100.0);
    }
}

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

pub(crate) fn check_income(monthly_income: f64) -> Result<(), CalcError> {
    if !monthly_income.is_finite() || monthly_income <= 0.0 {
        return Err(CalcError::InvalidIncome(monthly_income));
    }
    Ok(())
}

pub(crate) fn check_rate(savings_rate: f64) -> Result<(), CalcError> {
    if !savings_rate.is_finite() || !(RATE_RANGE.0..=RATE_RANGE.1).contains(&savings_rate) {
        return Err(CalcError::InvalidRate(savings_rate));
    }
    Ok(())
}

fn check_expenses(monthly_expenses: f64) -> Result<(), CalcError> {
    if !monthly_expenses.is_finite() || monthly_expenses < 0.0 {
        return Err(CalcError::InvalidExpenses(monthly_expenses));
    }
    Ok(())
}
