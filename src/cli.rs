use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;

use crate::api::{ApiRequest, Calculation, ServerConfig, evaluate};
use crate::core::{ProjectionError, SavingsInputs, SearchInputs};

#[derive(Parser, Debug)]
#[command(
    name = "down-payment",
    about = "Down payment savings planner (fixed contribution, semiannual raises, 3-year rate search)"
)]
pub struct Cli {
    #[arg(long, short, global = true, help = "Enable debug logging")]
    pub verbose: bool,
    #[arg(long, global = true, help = "Print the full JSON response")]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the web form and the JSON API
    Serve(ServeArgs),
    /// Months needed with a constant monthly contribution
    Fixed(ProjectionArgs),
    /// Months needed when the salary is raised every six months
    Stepped(SteppedArgs),
    /// Savings rate that reaches the down payment within three years
    Search(SearchArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    #[arg(long, default_value = "requests.csv", help = "CSV file receiving one row per request")]
    pub audit_log: PathBuf,
    #[arg(long, help = "Append to an existing audit log instead of truncating it on startup")]
    pub keep_audit_log: bool,
    #[arg(long, conflicts_with = "keep_audit_log", help = "Do not write an audit log")]
    pub no_audit_log: bool,
}

impl From<ServeArgs> for ServerConfig {
    fn from(args: ServeArgs) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            audit_log: (!args.no_audit_log).then_some(args.audit_log),
            reset_audit_log: !args.keep_audit_log,
        }
    }
}

#[derive(Args, Debug)]
pub struct ProjectionArgs {
    #[arg(long)]
    pub annual_salary: f64,
    #[arg(long, help = "Portion of the monthly salary saved, e.g. 0.1 for 10%")]
    pub portion_saved: f64,
    #[arg(long, help = "Total purchase cost; the down payment is 25% of it")]
    pub total_cost: f64,
    #[arg(long, help = "Include the month-by-month ledger (JSON output only)")]
    pub trace: bool,
}

impl ProjectionArgs {
    pub fn into_request(self) -> ApiRequest {
        ApiRequest::new(
            Calculation::Projection(SavingsInputs::fixed(
                self.annual_salary,
                self.portion_saved,
                self.total_cost,
            )),
            self.trace,
        )
    }
}

#[derive(Args, Debug)]
pub struct SteppedArgs {
    #[command(flatten)]
    pub projection: ProjectionArgs,
    #[arg(long, help = "Raise applied every six months, e.g. 0.03 for 3%")]
    pub semi_raise: f64,
}

impl SteppedArgs {
    pub fn into_request(self) -> ApiRequest {
        let p = self.projection;
        ApiRequest::new(
            Calculation::Projection(SavingsInputs::stepped(
                p.annual_salary,
                p.portion_saved,
                p.total_cost,
                self.semi_raise,
            )),
            p.trace,
        )
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    #[arg(long, alias = "salary")]
    pub starting_salary: f64,
    #[arg(long, help = "Include every bisection probe (JSON output only)")]
    pub trace: bool,
}

impl SearchArgs {
    pub fn into_request(self) -> ApiRequest {
        ApiRequest::new(
            Calculation::Search(SearchInputs {
                starting_salary: self.starting_salary,
            }),
            self.trace,
        )
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Evaluates a request and renders it as the plain message or pretty JSON.
pub fn render(request: &ApiRequest, json: bool) -> Result<String, CliError> {
    let response = evaluate(request)?;
    if json {
        Ok(serde_json::to_string_pretty(&response)?)
    } else {
        Ok(response.message)
    }
}
