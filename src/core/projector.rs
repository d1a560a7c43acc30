use tracing::debug;

use super::error::CalcError;
use super::resolver::{check_income, check_rate};
use super::types::{
    MAX_HORIZON_YEARS, Projection, ProjectionInput, ProjectionResult, RETURN_RANGE,
    SAFE_WITHDRAWAL_RATE, YearTracePoint,
};

#[derive(Debug, Clone, Copy)]
struct Plan {
    monthly_savings: f64,
    annual_savings: f64,
    annual_return: f64,
    target_savings: f64,
}

impl Plan {
    fn from_input(input: &ProjectionInput) -> Result<Self, CalcError> {
        validate_input(input)?;
        let monthly_savings = input.monthly_income * (input.savings_rate / 100.0);
        let annual_expenses = input.monthly_expenses() * 12.0;
        let plan = Self {
            monthly_savings,
            annual_savings: monthly_savings * 12.0,
            annual_return: input.investment_return_percent / 100.0,
            target_savings: annual_expenses / SAFE_WITHDRAWAL_RATE,
        };
        // Income so large that yearly amounts overflow.
        if !plan.annual_savings.is_finite() || !plan.target_savings.is_finite() {
            return Err(CalcError::InvalidIncome(input.monthly_income));
        }
        Ok(plan)
    }

    fn step(&self, balance: f64) -> f64 {
        (balance + self.annual_savings) * (1.0 + self.annual_return)
    }
}

/// Projects years until savings reach the safe-withdrawal target.
///
/// Contributions land at the start of each simulated year and the whole
/// balance then compounds once. The loop is capped at
/// [`MAX_HORIZON_YEARS`]; a plan that cannot reach its target within that
/// horizon, or that saves nothing toward a positive target, is reported as
/// [`Projection::NonConvergent`].
pub fn project(input: &ProjectionInput) -> Result<Projection, CalcError> {
    let plan = Plan::from_input(input)?;

    if plan.target_savings <= 0.0 {
        return Ok(Projection::Converged(ProjectionResult {
            monthly_savings: plan.monthly_savings,
            years_to_retire: 0,
            total_savings_at_retirement: 0.0,
            monthly_spending: 0.0,
            target_savings: 0.0,
        }));
    }

    if plan.annual_savings <= 0.0 {
        debug!(target = plan.target_savings, "no contributions toward a positive target");
        return Ok(Projection::NonConvergent {
            horizon_years: 0,
            total_savings_at_horizon: 0.0,
            target_savings: plan.target_savings,
        });
    }

    let mut total_savings = 0.0;
    let mut years = 0;
    while total_savings < plan.target_savings {
        if years == MAX_HORIZON_YEARS {
            debug!(
                years,
                total_savings,
                target = plan.target_savings,
                "projection hit horizon cap"
            );
            return Ok(Projection::NonConvergent {
                horizon_years: years,
                total_savings_at_horizon: total_savings,
                target_savings: plan.target_savings,
            });
        }
        let next = plan.step(total_savings);
        if !next.is_finite() {
            debug!(years, total_savings, "projection balance overflowed");
            return Ok(Projection::NonConvergent {
                horizon_years: years,
                total_savings_at_horizon: total_savings,
                target_savings: plan.target_savings,
            });
        }
        total_savings = next;
        years += 1;
    }

    debug!(years, total_savings, "projection converged");
    Ok(Projection::Converged(ProjectionResult {
        monthly_savings: plan.monthly_savings,
        years_to_retire: years,
        total_savings_at_retirement: total_savings,
        monthly_spending: total_savings * SAFE_WITHDRAWAL_RATE / 12.0,
        target_savings: plan.target_savings,
    }))
}

/// Year-by-year balances of the projection, stopping at the year the target
/// is reached or at the horizon cap, whichever comes first.
pub fn project_yearly_trace(input: &ProjectionInput) -> Result<Vec<YearTracePoint>, CalcError> {
    let plan = Plan::from_input(input)?;
    if plan.target_savings <= 0.0 || plan.annual_savings <= 0.0 {
        return Ok(Vec::new());
    }

    let mut points = Vec::new();
    let mut balance = 0.0;
    for year in 1..=MAX_HORIZON_YEARS {
        let end_balance = plan.step(balance);
        if !end_balance.is_finite() {
            break;
        }
        points.push(YearTracePoint {
            year,
            contribution: plan.annual_savings,
            growth: end_balance - balance - plan.annual_savings,
            end_balance,
            target_progress: end_balance / plan.target_savings,
        });
        balance = end_balance;
        if balance >= plan.target_savings {
            break;
        }
    }
    Ok(points)
}

pub fn validate_input(input: &ProjectionInput) -> Result<(), CalcError> {
    check_income(input.monthly_income)?;
    check_rate(input.savings_rate)?;
    check_return(input.investment_return_percent, RETURN_RANGE)
}

pub fn check_return(value: f64, (min, max): (f64, f64)) -> Result<(), CalcError> {
    if !value.is_finite() || !(min..=max).contains(&value) {
        return Err(CalcError::InvalidReturn { value, min, max });
    }
    Ok(())
}
