mod session;

use std::io::{self, BufRead, Write};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::core::{
    CalcError, DEFAULT_INVESTMENT_RETURN, DEFAULT_MONTHLY_EXPENSES, DEFAULT_MONTHLY_INCOME,
    FinancialProfile, Projection, ProjectionInput, RateSolveConfig, RateSolveResult,
    UI_RETURN_RANGE, UI_RETURN_STEP, YearTracePoint, check_return, project, project_yearly_trace,
    solve_savings_rate,
};

pub use session::{Session, SessionCommand, parse_command, run_session};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Calc(#[from] CalcError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "retire",
    about = "When will I retire? Projects years until savings support a 4% withdrawal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Project retirement for one set of inputs
    Calculate(CalculateArgs),
    /// Edit the form line by line on stdin and calculate on demand
    Session(SessionArgs),
    /// Find the savings rate needed to retire within a number of years
    Solve(SolveArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CalculateArgs {
    #[arg(long, default_value_t = DEFAULT_MONTHLY_INCOME, help = "Monthly income")]
    pub income: f64,
    #[arg(
        long,
        conflicts_with = "savings_rate",
        help = "Monthly expenses; the savings rate is derived from them"
    )]
    pub expenses: Option<f64>,
    #[arg(long, help = "Savings rate in percent; expenses are derived from it")]
    pub savings_rate: Option<f64>,
    #[arg(
        long = "return",
        default_value_t = DEFAULT_INVESTMENT_RETURN,
        help = "Expected annual investment return in percent (2 to 12, step 0.1)"
    )]
    pub investment_return: f64,
    #[arg(long, help = "Include the year-by-year balance trace")]
    pub trace: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct SolveArgs {
    #[arg(long, help = "Target number of years until retirement")]
    pub years: u32,
    #[arg(long, default_value_t = DEFAULT_MONTHLY_INCOME)]
    pub income: f64,
    #[arg(long = "return", default_value_t = DEFAULT_INVESTMENT_RETURN)]
    pub investment_return: f64,
    #[arg(long, default_value_t = 0.01, help = "Bisection tolerance in percentage points")]
    pub tolerance: f64,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    Converged,
    NonConvergent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateResponse {
    pub status: ResponseStatus,
    pub years_to_retire: Option<u32>,
    pub savings_rate: f64,
    pub investment_return_percent: f64,
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub monthly_savings: f64,
    pub monthly_spending: Option<f64>,
    pub total_savings_at_retirement: Option<f64>,
    pub target_savings: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<YearTracePoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveResponse {
    target_years: u32,
    monthly_income: f64,
    investment_return_percent: f64,
    feasible: bool,
    converged: bool,
    solved_rate: Option<f64>,
    whole_percent_rate: Option<f64>,
    years_to_retire: Option<u32>,
    monthly_spending: Option<f64>,
    iterations: usize,
    message: String,
}

pub fn run<R: BufRead, W: Write>(cli: Cli, input: R, output: &mut W) -> Result<(), CliError> {
    match cli.command {
        Command::Calculate(args) => run_calculate(&args, output),
        Command::Session(args) => run_session(input, output, args.format),
        Command::Solve(args) => run_solve(&args, output),
    }
}

fn run_calculate<W: Write>(args: &CalculateArgs, output: &mut W) -> Result<(), CliError> {
    let (profile, investment_return) = build_profile(args)?;
    let response = calculate(&profile, investment_return, args.trace)?;
    info!(
        income = profile.monthly_income,
        savings_rate = profile.savings_rate,
        investment_return,
        status = ?response.status,
        "calculated retirement projection"
    );
    write_response(output, &response, args.format)
}

fn run_solve<W: Write>(args: &SolveArgs, output: &mut W) -> Result<(), CliError> {
    let investment_return = normalize_ui_return(args.investment_return)?;
    let config = RateSolveConfig {
        tolerance: args.tolerance,
        ..RateSolveConfig::for_years(args.years)
    };
    let result = solve_savings_rate(args.income, investment_return, config)?;
    let response = build_solve_response(args.income, investment_return, &result);

    match args.format {
        OutputFormat::Json => writeln!(output, "{}", serde_json::to_string(&response)?)?,
        OutputFormat::Text => {
            writeln!(output, "{}", response.message)?;
            if let Some(rate) = response.whole_percent_rate {
                writeln!(
                    output,
                    "Save at least {rate}% of {} per month to retire within {} years.",
                    format_money(response.monthly_income),
                    response.target_years
                )?;
            }
            if let (Some(years), Some(spending)) = (response.years_to_retire, response.monthly_spending) {
                writeln!(
                    output,
                    "At that rate you retire in {years} years with {} per month to spend.",
                    format_money(spending)
                )?;
            }
        }
    }
    Ok(())
}

/// Snapshots the profile and return, and builds the display response.
pub fn calculate(
    profile: &FinancialProfile,
    investment_return: f64,
    with_trace: bool,
) -> Result<CalculateResponse, CalcError> {
    let input = ProjectionInput::from_profile(profile, investment_return);
    let projection = project(&input)?;
    let trace = if with_trace {
        project_yearly_trace(&input)?
    } else {
        Vec::new()
    };
    Ok(build_calculate_response(profile, investment_return, &projection, trace))
}

fn build_profile(args: &CalculateArgs) -> Result<(FinancialProfile, f64), CalcError> {
    let investment_return = normalize_ui_return(args.investment_return)?;
    let profile = match args.savings_rate {
        Some(rate) => FinancialProfile::with_savings_rate(args.income, rate)?,
        None => FinancialProfile::new(
            args.income,
            args.expenses.unwrap_or(DEFAULT_MONTHLY_EXPENSES),
        )?,
    };
    Ok((profile, investment_return))
}

/// Applies the stepper contract: bounded to [2, 12] and snapped to one decimal.
pub fn normalize_ui_return(value: f64) -> Result<f64, CalcError> {
    if !value.is_finite() {
        return Err(CalcError::InvalidReturn {
            value,
            min: UI_RETURN_RANGE.0,
            max: UI_RETURN_RANGE.1,
        });
    }
    let snapped = (value / UI_RETURN_STEP).round() / UI_RETURN_STEP.recip();
    check_return(snapped, UI_RETURN_RANGE)?;
    Ok(snapped)
}

fn build_calculate_response(
    profile: &FinancialProfile,
    investment_return: f64,
    projection: &Projection,
    trace: Vec<YearTracePoint>,
) -> CalculateResponse {
    let base = CalculateResponse {
        status: ResponseStatus::Converged,
        years_to_retire: None,
        savings_rate: profile.savings_rate,
        investment_return_percent: investment_return,
        monthly_income: profile.monthly_income,
        monthly_expenses: profile.monthly_expenses,
        monthly_savings: profile.monthly_savings(),
        monthly_spending: None,
        total_savings_at_retirement: None,
        target_savings: 0.0,
        message: None,
        trace,
    };

    match projection {
        Projection::Converged(result) => CalculateResponse {
            years_to_retire: Some(result.years_to_retire),
            monthly_savings: result.monthly_savings,
            monthly_spending: Some(result.monthly_spending),
            total_savings_at_retirement: Some(result.total_savings_at_retirement),
            target_savings: result.target_savings,
            ..base
        },
        Projection::NonConvergent {
            horizon_years,
            target_savings,
            ..
        } => CalculateResponse {
            status: ResponseStatus::NonConvergent,
            target_savings: *target_savings,
            message: Some(if *horizon_years == 0 {
                "Cannot retire under current inputs: nothing is being saved.".to_string()
            } else {
                format!(
                    "Cannot retire under current inputs: target not reached within {horizon_years} years."
                )
            }),
            ..base
        },
    }
}

fn build_solve_response(
    monthly_income: f64,
    investment_return: f64,
    result: &RateSolveResult,
) -> SolveResponse {
    SolveResponse {
        target_years: result.target_years,
        monthly_income,
        investment_return_percent: investment_return,
        feasible: result.feasible,
        converged: result.converged,
        solved_rate: result.solved_rate,
        whole_percent_rate: result.whole_percent_rate,
        years_to_retire: result.achieved.map(|a| a.years_to_retire),
        monthly_spending: result.achieved.map(|a| a.monthly_spending),
        iterations: result.iterations.len(),
        message: result.message.clone(),
    }
}

pub fn write_response<W: Write>(
    output: &mut W,
    response: &CalculateResponse,
    format: OutputFormat,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => writeln!(output, "{}", serde_json::to_string(response)?)?,
        OutputFormat::Text => output.write_all(render_text(response).as_bytes())?,
    }
    Ok(())
}

pub fn render_text(response: &CalculateResponse) -> String {
    let mut text = String::new();
    match (response.status, response.years_to_retire) {
        (ResponseStatus::Converged, Some(0)) => {
            text.push_str("You can retire now: your expenses are fully covered.\n");
        }
        (ResponseStatus::Converged, Some(years)) => {
            text.push_str(&format!("You can retire in {years} years.\n"));
        }
        _ => {
            let message = response
                .message
                .as_deref()
                .unwrap_or("Cannot retire under current inputs.");
            text.push_str(message);
            text.push('\n');
        }
    }
    text.push_str(&format!(
        "Savings rate: {}% | Investment return: {}%\n",
        response.savings_rate, response.investment_return_percent
    ));
    text.push_str(&format!(
        "Monthly savings: {}\n",
        format_money(response.monthly_savings)
    ));
    if let Some(total) = response.total_savings_at_retirement {
        text.push_str(&format!(
            "Total savings at retirement: {}\n",
            format_money(total)
        ));
    }
    if let Some(spending) = response.monthly_spending {
        text.push_str(&format!(
            "Monthly spending in retirement: {}\n",
            format_money(spending)
        ));
    }
    for point in &response.trace {
        text.push_str(&format!(
            "  year {:>3}: {:>16} ({:.1}% of target)\n",
            point.year,
            format_money(point.end_balance),
            point.target_progress * 100.0
        ));
    }
    text
}

/// Dollar amount with thousands separators and cents, e.g. `$1,234.50`.
/// Non-finite values render as `n/a`.
pub fn format_money(value: f64) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, ch) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("retire").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    fn run_to_string(cli: Cli) -> Result<String, CliError> {
        let mut out = Vec::new();
        run(cli, io::empty(), &mut out)?;
        Ok(String::from_utf8(out).expect("utf-8 output"))
    }

    #[test]
    fn calculate_defaults_match_the_form() {
        let cli = parse(&["calculate"]);
        let Command::Calculate(args) = cli.command else {
            panic!("expected calculate");
        };
        let (profile, investment_return) = build_profile(&args).expect("valid defaults");
        assert_approx(profile.monthly_income, 5_000.0);
        assert_approx(profile.monthly_expenses, 1_500.0);
        assert_approx(profile.savings_rate, 70.0);
        assert_approx(investment_return, 9.0);
    }

    #[test]
    fn savings_rate_and_expenses_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "retire",
            "calculate",
            "--expenses",
            "100",
            "--savings-rate",
            "50",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn calculate_json_contains_display_fields() {
        let out = run_to_string(parse(&["calculate", "--format", "json"])).expect("must run");
        let json: serde_json::Value = serde_json::from_str(out.trim()).expect("valid json");
        assert_eq!(json["status"], "converged");
        assert_eq!(json["yearsToRetire"], 8);
        assert_eq!(json["savingsRate"], 70.0);
        assert_eq!(json["investmentReturnPercent"], 9.0);
        assert!(json["monthlySpending"].is_number());
        assert!(json["monthlySavings"].is_number());
        assert!(json["totalSavingsAtRetirement"].is_number());
        assert!(json.get("trace").is_none());
    }

    #[test]
    fn zero_savings_rate_reports_cannot_retire() {
        let out = run_to_string(parse(&["calculate", "--savings-rate", "0"])).expect("must run");
        assert!(out.contains("Cannot retire under current inputs"));
        assert!(!out.contains("Monthly spending"));
    }

    #[test]
    fn full_savings_rate_retires_now() {
        let out = run_to_string(parse(&["calculate", "--savings-rate", "100"])).expect("must run");
        assert!(out.starts_with("You can retire now"));
    }

    #[test]
    fn zero_income_is_an_error() {
        let err = run_to_string(parse(&["calculate", "--income", "0"])).expect_err("must fail");
        assert!(matches!(err, CliError::Calc(CalcError::InvalidIncome(_))));
    }

    #[test]
    fn return_outside_stepper_bounds_is_rejected() {
        for value in [1.9, 12.1, 12.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                normalize_ui_return(value),
                Err(CalcError::InvalidReturn { .. })
            ));
        }
        assert_approx(normalize_ui_return(7.04).expect("in range"), 7.0);
        assert_approx(normalize_ui_return(2.0).expect("in range"), 2.0);
        assert_approx(normalize_ui_return(12.0).expect("in range"), 12.0);
        // both ends snap to the step before the bounds apply
        assert_approx(normalize_ui_return(1.96).expect("snaps to 2.0"), 2.0);
        assert_approx(normalize_ui_return(12.04).expect("snaps to 12.0"), 12.0);
    }

    #[test]
    fn trace_flag_renders_each_year() {
        let out = run_to_string(parse(&["calculate", "--trace"])).expect("must run");
        assert_eq!(out.lines().filter(|l| l.trim_start().starts_with("year")).count(), 8);
    }

    #[test]
    fn solve_json_reports_rate() {
        let out = run_to_string(parse(&[
            "solve", "--years", "25", "--return", "2", "--format", "json",
        ]))
        .expect("must run");
        let json: serde_json::Value = serde_json::from_str(out.trim()).expect("valid json");
        assert_eq!(json["feasible"], true);
        assert!(json["solvedRate"].as_f64().is_some_and(|r| r > 0.0 && r < 50.0));
    }

    #[test]
    fn format_money_groups_thousands() {
        assert_eq!(format_money(0.0), "$0.00");
        assert_eq!(format_money(1_500.0), "$1,500.00");
        assert_eq!(format_money(1_234_567.891), "$1,234,567.89");
        assert_eq!(format_money(999.999), "$1,000.00");
        assert_eq!(format_money(-42.5), "-$42.50");
        assert_eq!(format_money(-0.001), "$0.00");
    }

    #[test]
    fn format_money_handles_extreme_values() {
        assert_eq!(format_money(f64::INFINITY), "n/a");
        assert_eq!(format_money(f64::NAN), "n/a");
        let huge = format_money(1e20);
        assert_eq!(huge, "$100,000,000,000,000,000,000.00");
    }

    #[test]
    fn huge_income_renders_its_real_savings_figure() {
        let profile = FinancialProfile::new(1e20, 1_500.0).expect("valid profile");
        let response = calculate(&profile, 9.0, false).expect("finite projection");
        let text = render_text(&response);
        assert!(!text.contains("184,467,440,737,095,516"));
        assert!(text.contains("Monthly savings: $"));
    }

    #[test]
    fn overflowing_income_is_an_error_not_infinity() {
        let profile = FinancialProfile::new(1e308, 1_500.0).expect("income itself is finite");
        assert!(matches!(
            calculate(&profile, 9.0, false),
            Err(CalcError::InvalidIncome(_))
        ));
    }
}
