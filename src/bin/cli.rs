//! Binary entry point for the sqlweave CLI.
#![forbid(unsafe_code)]

#[path = "cli/config.rs"]
mod config;

use std::error::Error;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sqlweave::error::ErrorWithCode;
use sqlweave::{
    normalize_whitespace, prune, used_parameters, Command as SqlCommand, EngineConfig, Evaluator,
    ExecuteResult, OutValue, RepeatCounts, SqliteEngine, Value, VariableContext,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use config::CliConfig;

#[derive(Parser, Debug)]
#[command(
    name = "sqlweave",
    version,
    about = "Prune SQL templates, evaluate guard expressions and run bound statements",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "SQLWEAVE_CONFIG",
        help = "Path to the CLI config file"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        help = "Output format for structured responses [default: text]"
    )]
    format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Prune a template and print the resulting SQL")]
    Prune(PruneCmd),

    #[command(about = "Evaluate a guard expression")]
    Eval(EvalCmd),

    #[command(about = "Execute a statement or template against SQLite")]
    Exec(ExecCmd),
}

#[derive(Args, Debug)]
struct PruneCmd {
    #[arg(value_name = "TEMPLATE", help = "Template file, or '-' for stdin")]
    template: PathBuf,

    #[arg(long, value_name = "FILE", help = "JSON object of variable values")]
    values: Option<PathBuf>,

    #[arg(
        long = "repeat",
        value_name = "NAME=N",
        value_parser = parse_repeat,
        help = "Expansion size for an <a> placeholder (repeatable)"
    )]
    repeats: Vec<(String, usize)>,

    #[arg(long, help = "Collapse whitespace in the output")]
    normalize: bool,
}

#[derive(Args, Debug)]
struct EvalCmd {
    #[arg(value_name = "EXPR")]
    expression: String,

    #[arg(long, value_name = "FILE", help = "JSON object of variable values")]
    values: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExecCmd {
    #[arg(value_name = "TEMPLATE", help = "Statement or template file, or '-' for stdin")]
    template: PathBuf,

    #[arg(long, value_name = "PATH", help = "SQLite database (default: config or in-memory)")]
    db: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        help = "JSON object of binds; arrays become array binds"
    )]
    binds: Option<PathBuf>,

    #[arg(long, value_name = "N", help = "Rows per execution for array binds")]
    array_bind_count: Option<usize>,

    #[arg(long = "out", value_name = "NAME", help = "Declare an output parameter (repeatable)")]
    outs: Vec<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        match err.downcast_ref::<sqlweave::Error>() {
            Some(err) => {
                eprintln!("error: {}", ErrorWithCode(err));
                if let Some(rows) = err.row_errors() {
                    for (row, failure) in rows {
                        eprintln!("  row {row}: {failure}");
                    }
                }
            }
            None => eprintln!("error: {err}"),
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.clone())?;
    debug!(config = ?config.path(), "cli config loaded");
    let format = cli.format.or(config.format()).unwrap_or(OutputFormat::Text);

    match cli.command {
        Command::Prune(cmd) => {
            let template = read_source(&cmd.template)?;
            let values = read_values(cmd.values.as_deref())?;
            let repeats: RepeatCounts = cmd.repeats.into_iter().collect();
            let mut sql = prune(&template, &values, &repeats)?;
            if cmd.normalize || config.normalize() {
                sql = normalize_whitespace(&sql);
            }
            let report = PruneReport {
                used_parameters: used_parameters(&sql).into_iter().collect(),
                sql,
            };
            emit(format, &report, || println!("{}", report.sql))?;
        }
        Command::Eval(cmd) => {
            let values = read_values(cmd.values.as_deref())?;
            let result = Evaluator::new(Some(&values)).matches(&cmd.expression)?;
            let report = EvalReport {
                expression: cmd.expression,
                result,
            };
            emit(format, &report, || println!("{}", report.result))?;
        }
        Command::Exec(cmd) => {
            let text = read_source(&cmd.template)?;
            let mut command = match cmd.array_bind_count {
                Some(count) => SqlCommand::with_array_bind_count(text, count)?,
                None => SqlCommand::new(text),
            };
            let binds = read_values(cmd.binds.as_deref())?;
            for (name, value) in binds {
                match value {
                    Value::Seq(items) => command.bind_array(name, items)?,
                    scalar => command.bind_scalar(name, scalar)?,
                };
            }
            for name in cmd.outs {
                command.out_param(name)?;
            }
            let engine_config = match cmd.db {
                Some(path) => EngineConfig {
                    path: Some(path),
                    ..config.engine()
                },
                None => config.engine(),
            };
            let mut engine = SqliteEngine::open_with(&engine_config)?;
            let result = command.execute(&mut engine)?;
            let report = ExecReport::from(&result);
            emit(format, &report, || print_exec_text(&report))?;
        }
    }
    Ok(())
}

fn parse_repeat(raw: &str) -> Result<(String, usize), String> {
    let (name, count) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=N, got '{raw}'"))?;
    let count = count
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("invalid repeat count '{count}': {err}"))?;
    Ok((name.trim().to_string(), count))
}

fn read_source(path: &Path) -> Result<String, Box<dyn Error>> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    fs::read_to_string(path).map_err(|err| format!("failed to read {}: {err}", path.display()).into())
}

fn read_values(path: Option<&Path>) -> Result<VariableContext, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(VariableContext::new());
    };
    let contents = read_source(path)?;
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&contents)
        .map_err(|err| format!("{} must hold a JSON object: {err}", path.display()))?;
    Ok(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
}

#[derive(Serialize)]
struct PruneReport {
    sql: String,
    used_parameters: Vec<String>,
}

#[derive(Serialize)]
struct EvalReport {
    expression: String,
    result: bool,
}

#[derive(Serialize)]
struct ExecReport {
    rows_affected: u64,
    columns: Vec<String>,
    rows: Vec<Vec<serde_json::Value>>,
    out_values: serde_json::Map<String, serde_json::Value>,
}

impl From<&ExecuteResult> for ExecReport {
    fn from(result: &ExecuteResult) -> Self {
        let columns = result
            .rows
            .first()
            .map(|row| row.columns.clone())
            .unwrap_or_default();
        let rows = result
            .rows
            .iter()
            .map(|row| row.values.iter().map(serde_json::Value::from).collect())
            .collect();
        let out_values = result
            .out_values
            .iter()
            .map(|(name, out)| {
                let json = match out {
                    OutValue::Scalar(value) => serde_json::Value::from(value),
                    OutValue::Array(values) => {
                        serde_json::Value::Array(values.iter().map(serde_json::Value::from).collect())
                    }
                };
                (name.clone(), json)
            })
            .collect();
        Self {
            rows_affected: result.rows_affected,
            columns,
            rows,
            out_values,
        }
    }
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_exec_text(report: &ExecReport) {
    if !report.columns.is_empty() {
        println!("{}", report.columns.join("\t"));
        for row in &report.rows {
            let cells: Vec<String> = row.iter().map(render_cell).collect();
            println!("{}", cells.join("\t"));
        }
    }
    println!("rows affected: {}", report.rows_affected);
    for (name, value) in &report.out_values {
        println!(":{name} = {value}");
    }
}

fn render_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}
