use tracing::debug;

use super::error::CalcError;
use super::projector::project;
use super::resolver::check_income;
use super::types::{MAX_HORIZON_YEARS, Projection, ProjectionInput, ProjectionResult, RATE_RANGE};

#[derive(Debug, Clone, Copy)]
pub struct RateSolveConfig {
    pub target_years: u32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl RateSolveConfig {
    pub fn for_years(target_years: u32) -> Self {
        Self {
            target_years,
            search_min: RATE_RANGE.0,
            search_max: RATE_RANGE.1,
            tolerance: 0.01,
            max_iterations: 32,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_rate: f64,
    pub years_to_retire: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct RateSolveResult {
    pub target_years: u32,
    pub solved_rate: Option<f64>,
    /// Smallest whole-percent rate at or above `solved_rate`, as a slider
    /// would offer it.
    pub whole_percent_rate: Option<f64>,
    pub achieved: Option<ProjectionResult>,
    pub iterations: Vec<RateSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Finds the lowest savings rate that retires within `config.target_years`.
///
/// Years-to-retire never increases with the savings rate, so the feasible
/// rates form an interval reaching up to the search maximum and bisection
/// narrows in on its lower edge.
pub fn solve_savings_rate(
    monthly_income: f64,
    investment_return_percent: f64,
    config: RateSolveConfig,
) -> Result<RateSolveResult, CalcError> {
    validate_config(monthly_income, config)?;

    let meets = |rate: f64| -> Result<(bool, Option<u32>), CalcError> {
        let projection = project(&ProjectionInput {
            monthly_income,
            savings_rate: rate,
            investment_return_percent,
        })?;
        let years = projection.years_to_retire();
        Ok((years.is_some_and(|y| y <= config.target_years), years))
    };

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let mut solved_rate = None;
    let mut converged = false;
    let feasible;
    let message;

    if meets(config.search_min)?.0 {
        solved_rate = Some(config.search_min);
        converged = true;
        feasible = true;
        message = "Already retires in time at the lower rate bound.".to_string();
    } else if !meets(config.search_max)?.0 {
        feasible = false;
        message = "No savings rate within the search bounds retires in time.".to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let (ok, years) = meets(mid)?;
            iterations.push(RateSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_rate: mid,
                years_to_retire: years,
            });

            if ok {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved_rate = Some(hi);
        feasible = true;
        message = if converged {
            "Solved required savings rate.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate.".to_string()
        };
    }

    let whole_percent_rate = solved_rate.map(|rate| rate.ceil().min(config.search_max));
    let achieved = match solved_rate {
        Some(rate) => match project(&ProjectionInput {
            monthly_income,
            savings_rate: rate,
            investment_return_percent,
        })? {
            Projection::Converged(result) => Some(result),
            Projection::NonConvergent { .. } => None,
        },
        None => None,
    };

    debug!(
        target_years = config.target_years,
        ?solved_rate,
        iterations = iterations.len(),
        converged,
        feasible,
        "savings rate solve finished"
    );

    Ok(RateSolveResult {
        target_years: config.target_years,
        solved_rate,
        whole_percent_rate,
        achieved,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn validate_config(monthly_income: f64, config: RateSolveConfig) -> Result<(), CalcError> {
    check_income(monthly_income)?;
    if config.target_years == 0 || config.target_years > MAX_HORIZON_YEARS {
        return Err(CalcError::InvalidTarget {
            value: config.target_years,
            max: MAX_HORIZON_YEARS,
        });
    }
    for bound in [config.search_min, config.search_max] {
        if !bound.is_finite() || !(RATE_RANGE.0..=RATE_RANGE.1).contains(&bound) {
            return Err(CalcError::InvalidRate(bound));
        }
    }
    if config.search_max <= config.search_min {
        return Err(CalcError::InvalidRate(config.search_max));
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(CalcError::InvalidSolverConfig {
            field: "tolerance",
            value: config.tolerance,
        });
    }
    if config.max_iterations == 0 {
        return Err(CalcError::InvalidSolverConfig {
            field: "max_iterations",
            value: 0.0,
        });
    }
    Ok(())
}
