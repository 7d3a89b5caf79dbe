//! QuantRisk CLI - Command line interface for risk analytics.
//!
//! Every command prints a JSON `ApiResponse` envelope on stdout; logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quantrisk_core::market_data::read_price_csv;
use quantrisk_core::{
    analyze, analyze_portfolio, compute_returns, estimate_hurst, estimate_var_with,
    AnalysisHistory, AnalysisRequest, ApiResponse, CsvPriceSource, Interval, MonteCarloConfig,
    Portfolio, PortfolioPosition, PriceSeries, PriceSource, Result, ReturnMode, Settings,
    Statistic, VarMethod, VarParameters,
};

#[derive(Parser)]
#[command(name = "quantrisk")]
#[command(about = "QuantRisk CLI - value at risk and Hurst exponent for price series")]
#[command(version)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the return series of a price file
    Returns {
        /// Price CSV file
        #[arg(short, long)]
        file: PathBuf,
        /// simple or log
        #[arg(short, long, default_value = "simple")]
        mode: ReturnMode,
    },
    /// Value at Risk for a single price file
    Var {
        /// Price CSV file
        #[arg(short, long)]
        file: PathBuf,
        #[command(flatten)]
        params: VarArgs,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Historical simulation VaR for a portfolio of positions
    PortfolioVar {
        /// Directory of <SYMBOL>.csv price files
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Position as SYMBOL=VALUE, repeatable
        #[arg(short, long = "position", value_parser = parse_position, required = true)]
        positions: Vec<PortfolioPosition>,
        /// First calendar day (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Last calendar day (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
        /// Confidence level (0.99 = 99%)
        #[arg(long, default_value = "0.99")]
        confidence: f64,
        /// Horizon in days
        #[arg(long, default_value = "1")]
        horizon_days: usize,
        /// Append the report to the history
        #[arg(long)]
        save: bool,
    },
    /// Hurst exponent for a single price file
    Hurst {
        /// Price CSV file
        #[arg(short, long)]
        file: PathBuf,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Fetch a symbol and compute the requested statistics
    Analyze {
        /// Directory of <SYMBOL>.csv price files
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Ticker symbol
        #[arg(short, long)]
        symbol: String,
        /// 1min, 5min, 15min, 30min, 60min, daily, weekly or monthly
        #[arg(short, long, default_value = "daily")]
        interval: Interval,
        /// Statistics to compute (comma-separated: var,hurst)
        #[arg(short, long, value_delimiter = ',', default_value = "var,hurst")]
        calculate: Vec<Statistic>,
        #[command(flatten)]
        params: VarArgs,
        #[command(flatten)]
        window: WindowArgs,
        /// Append the report to the history
        #[arg(long)]
        save: bool,
    },
    /// Search the price directory for matching symbols
    Search {
        /// Directory of <SYMBOL>.csv price files
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Ticker or company name fragment
        keywords: String,
    },
    /// Stored analysis history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(clap::Args)]
struct VarArgs {
    /// historical, linear or monte_carlo
    #[arg(long, default_value = "historical")]
    method: VarMethod,
    /// Confidence level (0.99 = 99%)
    #[arg(long, default_value = "0.99")]
    confidence: f64,
    /// Portfolio value exposed to the security
    #[arg(long, default_value = "1000000")]
    value: f64,
    /// Number of most recent returns to sample
    #[arg(long, default_value = "200")]
    historical_days: usize,
    /// Horizon in days
    #[arg(long, default_value = "1")]
    horizon_days: usize,
    /// Monte Carlo draw count
    #[arg(long)]
    samples: Option<usize>,
    /// Monte Carlo seed
    #[arg(long)]
    seed: Option<u64>,
}

impl VarArgs {
    fn parameters(&self) -> VarParameters {
        VarParameters {
            method: self.method,
            confidence_level: self.confidence,
            portfolio_value: self.value,
            historical_days: self.historical_days,
            horizon_days: self.horizon_days,
        }
    }

    fn monte_carlo(&self, settings: &Settings) -> MonteCarloConfig {
        MonteCarloConfig {
            samples: self.samples.unwrap_or(settings.monte_carlo.samples),
            seed: self.seed.or(settings.monte_carlo.seed),
        }
    }
}

#[derive(clap::Args)]
struct WindowArgs {
    /// First session to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last session to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl WindowArgs {
    fn apply(&self, prices: PriceSeries) -> PriceSeries {
        match (self.from, self.to) {
            (None, None) => prices,
            (from, to) => prices.between(
                from.unwrap_or(NaiveDate::MIN),
                to.unwrap_or(NaiveDate::MAX),
            ),
        }
    }
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List stored entries
    List,
    /// Show one entry
    Show {
        #[arg(long)]
        id: u64,
    },
    /// Remove one entry
    Remove {
        #[arg(long)]
        id: u64,
    },
    /// Remove every entry
    Clear,
}

fn parse_position(raw: &str) -> std::result::Result<PortfolioPosition, String> {
    let (symbol, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SYMBOL=VALUE, got `{}`", raw))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid position value `{}`", value))?;
    Ok(PortfolioPosition::new(symbol, value))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = Settings::from_env().and_then(|settings| run(cli.command, &settings));
    let ok = result.is_ok();

    let response = ApiResponse::from(result);
    match serde_json::to_string_pretty(&response) {
        Ok(output) => println!("{}", output),
        Err(e) => println!("{}", json!({ "ok": false, "error": e.to_string() })),
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(command: Commands, settings: &Settings) -> Result<Value> {
    match command {
        Commands::Returns { file, mode } => {
            let prices = read_price_csv(&file)?;
            let returns = compute_returns(&prices, mode)?;
            Ok(json!({
                "mode": returns.mode,
                "count": returns.len(),
                "returns": returns.points,
            }))
        }
        Commands::Var {
            file,
            params,
            window,
        } => handle_var(&file, &params, &window, settings),
        Commands::PortfolioVar {
            data_dir,
            positions,
            from,
            to,
            confidence,
            horizon_days,
            save,
        } => {
            let source = CsvPriceSource::new(data_dir.unwrap_or_else(|| settings.data_dir.clone()));
            let request = Portfolio {
                positions,
                date_from: from,
                date_to: to,
                confidence_level: confidence,
                horizon_days,
            };
            let report = analyze_portfolio(&source, &request)?;
            if save {
                let mut history = AnalysisHistory::with_path(settings.history_file.clone())?;
                history.record_portfolio(&report)?;
                history.save()?;
            }
            Ok(serde_json::to_value(report)?)
        }
        Commands::Hurst { file, window } => {
            let prices = window.apply(read_price_csv(&file)?);
            Ok(serde_json::to_value(estimate_hurst(&prices)?)?)
        }
        Commands::Analyze {
            data_dir,
            symbol,
            interval,
            calculate,
            params,
            window,
            save,
        } => {
            let source = CsvPriceSource::new(data_dir.unwrap_or_else(|| settings.data_dir.clone()));
            let mut request = AnalysisRequest::new(&symbol, interval, calculate);
            request.var = params.parameters();
            request.date_from = window.from;
            request.date_to = window.to;

            let report = analyze(&source, &request, &params.monte_carlo(settings))?;
            if save {
                let mut history = AnalysisHistory::with_path(settings.history_file.clone())?;
                history.record_analysis(&report)?;
                history.save()?;
            }
            Ok(serde_json::to_value(report)?)
        }
        Commands::Search { data_dir, keywords } => {
            let source = CsvPriceSource::new(data_dir.unwrap_or_else(|| settings.data_dir.clone()));
            let matches = source.search(&keywords)?;
            Ok(json!({
                "keywords": keywords,
                "count": matches.len(),
                "matches": matches,
            }))
        }
        Commands::History { action } => handle_history(action, settings),
    }
}

fn handle_var(
    file: &Path,
    params: &VarArgs,
    window: &WindowArgs,
    settings: &Settings,
) -> Result<Value> {
    let parameters = params.parameters();
    parameters.validate()?;

    let prices = window.apply(read_price_csv(file)?);
    let returns = compute_returns(&prices, ReturnMode::Simple)?;
    let historical_days = parameters.historical_days.min(returns.len());

    let var = estimate_var_with(
        parameters.method,
        &returns,
        parameters.confidence_level,
        parameters.portfolio_value,
        historical_days,
        parameters.horizon_days,
        &params.monte_carlo(settings),
    )?;

    Ok(json!({
        "method": parameters.method,
        "confidence_level": parameters.confidence_level,
        "portfolio_value": parameters.portfolio_value,
        "historical_days": historical_days,
        "horizon_days": parameters.horizon_days,
        "var": var,
    }))
}

fn handle_history(action: HistoryAction, settings: &Settings) -> Result<Value> {
    let mut history = AnalysisHistory::with_path(settings.history_file.clone())?;

    match action {
        HistoryAction::List => Ok(json!({
            "count": history.len(),
            "entries": history.entries(),
        })),
        HistoryAction::Show { id } => match history.find(id) {
            Some(entry) => Ok(serde_json::to_value(entry)?),
            None => Err(quantrisk_core::Error::EntryNotFound(id)),
        },
        HistoryAction::Remove { id } => {
            let removed = history.remove(id)?;
            history.save()?;
            Ok(json!({ "removed": removed.id }))
        }
        HistoryAction::Clear => {
            let cleared = history.len();
            history.clear();
            history.save()?;
            Ok(json!({ "cleared": cleared }))
        }
    }
}
