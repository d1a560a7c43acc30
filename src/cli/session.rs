use std::io::{BufRead, Write};

use tracing::{debug, warn};

use super::{
    CalculateResponse, CliError, OutputFormat, calculate, format_money, normalize_ui_return,
    write_response,
};
use crate::core::{CalcError, DEFAULT_INVESTMENT_RETURN, EditEvent, FinancialProfile};

const HELP: &str = "\
commands:
  income <amount>    set monthly income (savings rate follows)
  expenses <amount>  set monthly expenses (savings rate follows)
  rate <percent>     set savings rate 0-100 (expenses follow)
  return <percent>   set investment return 2-12
  show               print the current form
  calc               calculate retirement
  trace              calculate with the yearly balance trace
  quit               leave the session
";

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SessionCommand {
    Edit(EditEvent),
    SetReturn(f64),
    Show,
    Calculate { with_trace: bool },
    Help,
    Quit,
}

/// One form session: the profile being edited, the chosen return, and the
/// most recent calculation.
#[derive(Debug, Clone)]
pub struct Session {
    profile: FinancialProfile,
    investment_return: f64,
    last_result: Option<CalculateResponse>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            profile: FinancialProfile::default(),
            investment_return: DEFAULT_INVESTMENT_RETURN,
            last_result: None,
        }
    }
}

impl Session {
    pub fn profile(&self) -> &FinancialProfile {
        &self.profile
    }

    pub fn investment_return(&self) -> f64 {
        self.investment_return
    }

    pub fn last_result(&self) -> Option<&CalculateResponse> {
        self.last_result.as_ref()
    }

    /// Edits never re-run the projection; the last result stays until the
    /// next explicit calculation.
    pub fn edit(&mut self, event: EditEvent) -> Result<(), CalcError> {
        self.profile.apply(event)
    }

    pub fn set_return(&mut self, value: f64) -> Result<(), CalcError> {
        self.investment_return = normalize_ui_return(value)?;
        Ok(())
    }

    pub fn calculate(&mut self, with_trace: bool) -> Result<&CalculateResponse, CalcError> {
        let response = calculate(&self.profile, self.investment_return, with_trace)?;
        Ok(self.last_result.insert(response))
    }
}

/// Parses one session line. Blank lines yield `None`. A value that is not a
/// number is passed through as NaN so the resolver reports it against the
/// field it was meant for.
pub fn parse_command(line: &str) -> Result<Option<SessionCommand>, String> {
    let mut parts = line.split_whitespace();
    let Some(keyword) = parts.next() else {
        return Ok(None);
    };
    let value = parts.next();
    if parts.next().is_some() {
        return Err(format!("too many arguments for '{keyword}'"));
    }

    let number = || -> Result<f64, String> {
        let raw = value.ok_or_else(|| format!("'{keyword}' needs a value"))?;
        let cleaned = raw.trim_start_matches('$').replace(',', "");
        Ok(cleaned.parse::<f64>().unwrap_or(f64::NAN))
    };

    let command = match keyword.to_ascii_lowercase().as_str() {
        "income" => SessionCommand::Edit(EditEvent::IncomeEdited(number()?)),
        "expenses" => SessionCommand::Edit(EditEvent::ExpensesImplied(number()?)),
        "rate" => SessionCommand::Edit(EditEvent::RateEdited(number()?)),
        "return" => SessionCommand::SetReturn(number()?),
        "show" => SessionCommand::Show,
        "calc" | "calculate" => SessionCommand::Calculate { with_trace: false },
        "trace" => SessionCommand::Calculate { with_trace: true },
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Some(command))
}

/// Reads commands from `input` until EOF or `quit`. Invalid edits are
/// reported inline and the session carries on.
pub fn run_session<R: BufRead, W: Write>(
    input: R,
    output: &mut W,
    format: OutputFormat,
) -> Result<(), CliError> {
    let mut session = Session::default();
    if format == OutputFormat::Text {
        write_form(output, &session)?;
    }

    for line in input.lines() {
        let line = line?;
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(msg) => {
                write_error(output, &msg, format)?;
                continue;
            }
        };
        debug!(?command, "session command");

        let outcome = match command {
            SessionCommand::Quit => break,
            SessionCommand::Help => write_help(output, format),
            SessionCommand::Show => write_form_as(output, &session, format),
            SessionCommand::Edit(event) => match session.edit(event) {
                Ok(()) => write_form_as(output, &session, format),
                Err(err) => Err(err.into()),
            },
            SessionCommand::SetReturn(value) => match session.set_return(value) {
                Ok(()) => write_form_as(output, &session, format),
                Err(err) => Err(err.into()),
            },
            SessionCommand::Calculate { with_trace } => match session.calculate(with_trace) {
                Ok(response) => write_response(output, response, format),
                Err(err) => Err(err.into()),
            },
        };

        match outcome {
            Ok(()) => {}
            Err(CliError::Calc(err)) => {
                warn!(%err, "rejected session input");
                write_error(output, &err.to_string(), format)?;
            }
            Err(other) => return Err(other),
        }
    }
    Ok(())
}

fn write_form_as<W: Write>(
    output: &mut W,
    session: &Session,
    format: OutputFormat,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => write_form(output, session),
        OutputFormat::Json => {
            writeln!(output, "{}", serde_json::to_string(session.profile())?)?;
            Ok(())
        }
    }
}

fn write_form<W: Write>(output: &mut W, session: &Session) -> Result<(), CliError> {
    let profile = session.profile();
    writeln!(
        output,
        "Monthly income: {} | Monthly expenses: {} | Savings rate: {}% | Investment return: {}%",
        format_money(profile.monthly_income),
        format_money(profile.monthly_expenses),
        profile.savings_rate,
        session.investment_return()
    )?;
    writeln!(
        output,
        "With monthly expenses of {}, you are saving {} per month.",
        format_money(profile.monthly_expenses),
        format_money(profile.monthly_savings())
    )?;
    Ok(())
}

fn write_help<W: Write>(output: &mut W, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => output.write_all(HELP.as_bytes())?,
        OutputFormat::Json => writeln!(
            output,
            "{}",
            serde_json::to_string(&serde_json::json!({ "help": HELP }))?
        )?,
    }
    Ok(())
}

fn write_error<W: Write>(output: &mut W, msg: &str, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => writeln!(output, "error: {msg}")?,
        OutputFormat::Json => writeln!(
            output,
            "{}",
            serde_json::to_string(&serde_json::json!({ "error": msg }))?
        )?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ResponseStatus;

    fn run_lines(lines: &str, format: OutputFormat) -> String {
        let mut out = Vec::new();
        run_session(lines.as_bytes(), &mut out, format).expect("session must run");
        String::from_utf8(out).expect("utf-8 output")
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(
            parse_command("income 6,000"),
            Ok(Some(SessionCommand::Edit(EditEvent::IncomeEdited(6_000.0))))
        );
        assert_eq!(
            parse_command("RATE 55"),
            Ok(Some(SessionCommand::Edit(EditEvent::RateEdited(55.0))))
        );
        assert_eq!(
            parse_command("trace"),
            Ok(Some(SessionCommand::Calculate { with_trace: true }))
        );
        assert!(parse_command("income").is_err());
        assert!(parse_command("rate 1 2").is_err());
        assert!(parse_command("launch").is_err());
    }

    #[test]
    fn non_numeric_income_maps_to_invalid_income() {
        let Ok(Some(SessionCommand::Edit(event))) = parse_command("income lots") else {
            panic!("expected an edit command");
        };
        let mut session = Session::default();
        assert!(matches!(session.edit(event), Err(CalcError::InvalidIncome(_))));
        assert_eq!(*session.profile(), FinancialProfile::default());
    }

    #[test]
    fn calculation_supersedes_previous_result() {
        let mut session = Session::default();
        let first = session.calculate(false).expect("valid").years_to_retire;
        session.edit(EditEvent::RateEdited(0.0)).expect("valid edit");

        // edits leave the previous result in place until the next calculation
        assert_eq!(session.last_result().and_then(|r| r.years_to_retire), first);

        let second = session.calculate(false).expect("valid");
        assert_eq!(second.status, ResponseStatus::NonConvergent);
        assert_eq!(second.years_to_retire, None);
    }

    #[test]
    fn set_return_enforces_stepper_bounds() {
        let mut session = Session::default();
        assert!(session.set_return(15.0).is_err());
        assert_eq!(session.investment_return(), DEFAULT_INVESTMENT_RETURN);
        session.set_return(6.56).expect("in range");
        assert!((session.investment_return() - 6.6).abs() < 1e-9);
    }

    #[test]
    fn session_reports_errors_inline_and_continues() {
        let out = run_lines("income 0\nrate 100\ncalc\nquit\ncalc\n", OutputFormat::Text);
        assert!(out.contains("error: monthly income must be a positive number"));
        assert!(out.contains("You can retire now"));
        assert_eq!(out.matches("You can retire").count(), 1);
    }

    #[test]
    fn json_session_emits_one_document_per_command() {
        let out = run_lines("expenses 2500\nbogus\ncalc\n", OutputFormat::Json);
        let docs: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).expect("each line is json"))
            .collect();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0]["savingsRate"], 50.0);
        assert!(docs[1]["error"].is_string());
        assert_eq!(docs[2]["status"], "converged");
    }

    #[test]
    fn json_session_help_is_a_single_document() {
        let out = run_lines("help\n", OutputFormat::Json);
        assert_eq!(out.lines().count(), 1);
        let doc: serde_json::Value = serde_json::from_str(out.trim()).expect("help is json");
        assert_eq!(doc["help"], HELP);

        let text = run_lines("help\n", OutputFormat::Text);
        assert!(text.contains("commands:"));
    }
}
