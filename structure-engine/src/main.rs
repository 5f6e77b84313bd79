use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use structure_engine::{
    generate_synthetic_candles, load_file, BacktestResult, BacktestRunner, MarketData, ParamGrid,
    StrategyParameters, SweepRow, SweepRunner, TimeframeRole,
};

/// 2024-01-01 00:00:00 UTC
const SYNTHETIC_START: i64 = 1_704_067_200;

#[derive(Parser, Debug)]
#[command(name = "structure-engine")]
#[command(version = "0.1.0")]
#[command(about = "Multi-timeframe market-structure backtest engine", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single backtest (default)
    Run(RunArgs),
    /// Run a parameter grid in parallel
    Sweep(SweepArgs),
}

#[derive(Args, Debug)]
struct DataArgs {
    /// Strategy parameters (TOML). Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Execution timeframe candles (CSV/JSON). If not provided, uses synthetic data.
    #[arg(short = 'f', long)]
    data_file: Option<PathBuf>,

    /// Higher timeframe candles; resampled from the data file when omitted
    #[arg(long, requires = "ltf_file")]
    htf_file: Option<PathBuf>,

    /// Lower timeframe candles; resampled from the data file when omitted
    #[arg(long, requires = "htf_file")]
    ltf_file: Option<PathBuf>,

    /// Number of synthetic execution bars
    #[arg(short, long, default_value = "5000")]
    bars: usize,

    /// Initial price for synthetic data
    #[arg(long, default_value = "100.0")]
    initial_price: f64,

    /// Seed for synthetic data
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Initial capital
    #[arg(short, long)]
    capital: Option<f64>,

    /// Symbol label for the report
    #[arg(short, long)]
    symbol: Option<String>,

    /// Fraction of equity risked per trade
    #[arg(long)]
    risk_fraction: Option<f64>,

    /// Disable the daily trade cap and the loss-streak pause
    #[arg(long)]
    no_session_limits: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Output format (json, text)
    #[arg(short, long, default_value = "json")]
    output: String,

    /// Pretty print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct SweepArgs {
    #[command(flatten)]
    data: DataArgs,

    #[arg(long, value_delimiter = ',', default_value = "0.005,0.01,0.02")]
    risk_fractions: Vec<f64>,

    #[arg(long, value_delimiter = ',', default_value = "2,3,5")]
    swing_radii: Vec<usize>,

    #[arg(long, value_delimiter = ',', default_value = "1.5,2,3")]
    reward_risks: Vec<f64>,

    /// Run the grid on one thread
    #[arg(long)]
    sequential: bool,

    /// Pretty print JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Run(args)) => run(args),
        Some(Command::Sweep(args)) => sweep(args),
        None => run(cli.run),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let params = build_params(&args.data)?;
    let data = load_market(&params, &args.data)?;

    info!(
        etf_bars = data.etf.len(),
        ltf_bars = data.ltf.len(),
        htf_bars = data.htf.len(),
        "running backtest"
    );
    let result = BacktestRunner::new(params).run(&data)?;

    match args.output.as_str() {
        "json" => print_json(&result, args.pretty)?,
        "text" => print_text_report(&result),
        other => {
            tracing::warn!(format = other, "unknown output format, using text");
            print_text_report(&result);
        }
    }

    Ok(())
}

fn sweep(args: SweepArgs) -> Result<()> {
    let base = build_params(&args.data)?;
    let data = load_market(&base, &args.data)?;
    let grid = ParamGrid {
        risk_fractions: args.risk_fractions,
        swing_radii: args.swing_radii,
        reward_risks: args.reward_risks,
    };

    let rows = SweepRunner::new()
        .with_parallelism(!args.sequential)
        .sweep(&grid, &base, &data)?;
    if let Some(best) = structure_engine::sweep::best_by_return(&rows) {
        info!(
            risk_fraction = best.risk_fraction,
            swing_radius = best.swing_radius,
            reward_risk = best.reward_risk,
            return_pct = best.metrics.total_return_pct,
            "best grid point"
        );
    }

    print_json::<Vec<SweepRow>>(&rows, args.pretty)
}

fn build_params(args: &DataArgs) -> Result<StrategyParameters> {
    let mut params = match &args.config {
        Some(path) => StrategyParameters::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StrategyParameters::default(),
    };

    if let Some(capital) = args.capital {
        params = params.with_capital(capital);
    }
    if let Some(symbol) = &args.symbol {
        params.symbol = symbol.clone();
    }
    if let Some(fraction) = args.risk_fraction {
        params = params.with_risk_fraction(fraction);
    }
    if args.no_session_limits {
        params = params.without_session_limits();
    }

    params.validate()?;
    Ok(params)
}

fn load_market(params: &StrategyParameters, args: &DataArgs) -> Result<MarketData> {
    let timeframes = &params.timeframes;
    let etf = match &args.data_file {
        Some(path) => {
            info!(path = %path.display(), "loading execution candles");
            load_file(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => {
            info!(
                bars = args.bars,
                initial_price = args.initial_price,
                seed = args.seed,
                "generating synthetic candles"
            );
            generate_synthetic_candles(
                args.bars,
                SYNTHETIC_START,
                timeframes.etf_secs,
                args.initial_price,
                args.seed,
            )
        }
    };

    let (Some(htf_path), Some(ltf_path)) = (&args.htf_file, &args.ltf_file) else {
        return Ok(MarketData::from_execution_candles(timeframes, &etf)?);
    };

    let mut data = MarketData::new(timeframes);
    let inputs = [
        (TimeframeRole::Htf, load_file(htf_path)?),
        (TimeframeRole::Ltf, load_file(ltf_path)?),
        (TimeframeRole::Etf, etf),
    ];
    for (role, candles) in inputs {
        for candle in candles {
            data.append_or_replace(role, candle)?;
        }
    }
    Ok(data)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

fn print_text_report(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("================================================================");
    println!("  BACKTEST REPORT - {} market structure", result.symbol);
    println!("================================================================");
    println!();
    println!("  Period: {} to {}", result.start_date, result.end_date);
    println!("  Execution bars: {}", result.equity_curve.len());
    println!("  Execution Time: {}ms", result.execution_time_ms);
    println!();
    println!("----------------------------------------------------------------");
    println!("  CAPITAL");
    println!("----------------------------------------------------------------");
    println!("  Initial Capital:  ${:>12.2}", result.initial_capital);
    println!("  Final Equity:     ${:>12.2}", result.final_equity);
    println!(
        "  Total Return:     ${:>12.2} ({:+.2}%)",
        m.total_return, m.total_return_pct
    );
    println!("  Max Drawdown:     {:>12.2}%", m.max_drawdown);
    println!("  Max DD Duration:  {:>12} bars", m.max_drawdown_duration_bars);
    println!();
    println!("----------------------------------------------------------------");
    println!("  TRADE STATISTICS");
    println!("----------------------------------------------------------------");
    println!("  Total Trades:     {:>12}", m.total_trades);
    println!("  Winning Trades:   {:>12}", m.winning_trades);
    println!("  Losing Trades:    {:>12}", m.losing_trades);
    println!("  Win Rate:         {:>12.1}%", m.win_rate);
    println!("  Avg Win:          ${:>12.2}", m.avg_win);
    println!("  Avg Loss:         ${:>12.2}", m.avg_loss);
    println!("  Profit Factor:    {:>12.3}", m.profit_factor);
    println!("  Expectancy:       ${:>12.2}", m.expectancy);
    println!("  Avg R Multiple:   {:>12.2}", m.avg_r_multiple);
    println!("  Avg Holding:      {:>12.1} hours", m.avg_holding_hours);
    println!("  Best Trade:       ${:>12.2}", m.best_trade);
    println!("  Worst Trade:      ${:>12.2}", m.worst_trade);
    println!();
    println!(
        "  Exits: {} stop / {} target / {} forced",
        m.stop_exits, m.target_exits, m.forced_exits
    );
    println!(
        "  Modules: {} mean reversion / {} continuation / {} pullback",
        m.mean_reversion_trades, m.continuation_trades, m.structure_pullback_trades
    );
    println!();
    println!("================================================================");

    if !result.trades.is_empty() {
        println!();
        println!("  RECENT TRADES (last 5)");
        println!("----------------------------------------------------------------");
        for trade in result.trades.iter().rev().take(5) {
            println!(
                "  {} -> {} | {:<18} {:?} | P&L: ${:+.2} ({:+.2}R) | {:?}",
                format_epoch(trade.entry_time),
                format_epoch(trade.exit_time),
                trade.module.label(),
                trade.side,
                trade.pnl,
                trade.r_multiple(),
                trade.exit_reason
            );
        }
        println!();
    }
}

fn format_epoch(epoch: i64) -> String {
    chrono::DateTime::from_timestamp(epoch, 0)
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| epoch.to_string())
}
