mod error;
mod projector;
mod resolver;
mod solver;
mod types;

pub use error::CalcError;
pub use projector::{check_return, project, project_yearly_trace, validate_input};
pub use resolver::{derive_monthly_expenses, derive_savings_rate, resolve};
pub use solver::{RateSolveConfig, RateSolveIteration, RateSolveResult, solve_savings_rate};
pub use types::{
    DEFAULT_INVESTMENT_RETURN, DEFAULT_MONTHLY_EXPENSES, DEFAULT_MONTHLY_INCOME, EditEvent,
    FinancialProfile, MAX_HORIZON_YEARS, Projection, ProjectionInput, ProjectionResult,
    RATE_RANGE, RETURN_RANGE, SAFE_WITHDRAWAL_RATE, UI_RETURN_RANGE, UI_RETURN_STEP,
    YearTracePoint,
};
