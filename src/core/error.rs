use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error("monthly income must be a positive number, got {0}")]
    InvalidIncome(f64),
    #[error("savings rate must be between 0 and 100, got {0}")]
    InvalidRate(f64),
    #[error("investment return must be between {min} and {max} percent, got {value}")]
    InvalidReturn { value: f64, min: f64, max: f64 },
    #[error("monthly expenses must be a non-negative number, got {0}")]
    InvalidExpenses(f64),
    #[error("solver {field} must be positive, got {value}")]
    InvalidSolverConfig { field: &'static str, value: f64 },
    #[error("target years must be between 1 and {max}, got {value}")]
    InvalidTarget { value: u32, max: u32 },
}
