use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use range_lmsr::{
    format_wad, parse_wad, MarketConfig, RangeMarket, TickRange, TradeRequest, TradeSide,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "range-lmsr", about = "Range LMSR market maker over a lazy multiplicative tree")]
struct Cli {
    #[command(flatten)]
    market: MarketArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct MarketArgs {
    /// Lowest tick of the outcome domain.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    min_tick: i64,
    /// Highest tick of the outcome domain.
    #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
    max_tick: i64,
    /// Width of each bin in ticks.
    #[arg(long, default_value_t = 1)]
    tick_spacing: i64,
    /// Liquidity parameter as a decimal (e.g. 100 or 12.5).
    #[arg(long, default_value = "100")]
    liquidity: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Quote a single trade against a fresh uniform market.
    Quote {
        /// `buy` or `sell`.
        side: String,
        /// Lower tick (inclusive).
        #[arg(allow_negative_numbers = true)]
        lower: i64,
        /// Upper tick (exclusive).
        #[arg(allow_negative_numbers = true)]
        upper: i64,
        /// Quantity as a decimal.
        quantity: String,
    },
    /// Replay a trade file and print a receipt per line.
    Replay {
        /// Trades file (`buy|sell <lower> <upper> <quantity>` per line, `#` comments).
        trades: PathBuf,
        /// Print every bin weight after the last trade.
        #[arg(long)]
        weights: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = market_config(&cli.market)?;

    match cli.command {
        Commands::Quote {
            side,
            lower,
            upper,
            quantity,
        } => run_quote(config, &side, TickRange::new(lower, upper), &quantity)?,
        Commands::Replay { trades, weights } => run_replay(config, &trades, weights)?,
    }

    Ok(())
}

fn market_config(args: &MarketArgs) -> Result<MarketConfig> {
    let liquidity = parse_wad(&args.liquidity)
        .with_context(|| format!("invalid liquidity '{}'", args.liquidity))?;
    let config = MarketConfig::with_domain(args.min_tick, args.max_tick)
        .with_tick_spacing(args.tick_spacing)
        .with_liquidity(liquidity);
    config.validate().context("invalid market configuration")?;
    Ok(config)
}

fn run_quote(config: MarketConfig, side: &str, range: TickRange, quantity: &str) -> Result<()> {
    let market = RangeMarket::new(config).context("failed to open market")?;
    let side = parse_side(side)?;
    let quantity =
        parse_wad(quantity).with_context(|| format!("invalid quantity '{}'", quantity))?;

    let amount = match side {
        TradeSide::Buy => market.cost_to_buy(range, quantity),
        TradeSide::Sell => market.proceeds_from_sell(range, quantity),
    }
    .with_context(|| format!("quote failed for {}", range))?;
    let probability = market.range_probability(range)?;

    println!(
        "{:?}\trange={}\tquantity={}\tamount={}\tprobability={}",
        side,
        range,
        format_wad(quantity),
        format_wad(amount),
        format_wad(probability)
    );
    Ok(())
}

fn run_replay(config: MarketConfig, path: &Path, print_weights: bool) -> Result<()> {
    let mut market = RangeMarket::new(config).context("failed to open market")?;
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("failed to open trades file {}", path.display()))?,
    );

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let Some(request) = parse_trade_line(&line)
            .with_context(|| format!("malformed trade on line {}", line_no + 1))?
        else {
            continue;
        };

        let receipt = market
            .execute(request)
            .with_context(|| format!("trade on line {} failed", line_no + 1))?;
        println!(
            "{}\t{:?}\trange={}\tbins=[{}, {}]\tquantity={}\tamount={}\tchunks={}\ttotal={}",
            line_no + 1,
            receipt.request.side,
            receipt.request.range,
            receipt.bins.lo,
            receipt.bins.hi,
            format_wad(receipt.request.quantity),
            format_wad(receipt.amount),
            receipt.chunks,
            format_wad(receipt.total_after)
        );
    }

    println!("digest\t{}", market.tree().state_digest().to_hex());
    if print_weights {
        for (bin, weight) in market.bin_weights()?.into_iter().enumerate() {
            println!("bin {}\t{}", bin, format_wad(weight));
        }
    }
    Ok(())
}

fn parse_trade_line(line: &str) -> Result<Option<TradeRequest>> {
    let content = line.split('#').next().unwrap_or("").trim();
    if content.is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = content.split_whitespace().collect();
    let [side, lower, upper, quantity] = fields.as_slice() else {
        bail!("expected 4 fields, found {}", fields.len());
    };

    let side = parse_side(side)?;
    let lower: i64 = lower
        .parse()
        .with_context(|| format!("invalid lower tick '{}'", lower))?;
    let upper: i64 = upper
        .parse()
        .with_context(|| format!("invalid upper tick '{}'", upper))?;
    let quantity =
        parse_wad(quantity).with_context(|| format!("invalid quantity '{}'", quantity))?;

    Ok(Some(TradeRequest {
        side,
        range: TickRange::new(lower, upper),
        quantity,
    }))
}

fn parse_side(side: &str) -> Result<TradeSide> {
    match side.to_ascii_lowercase().as_str() {
        "buy" => Ok(TradeSide::Buy),
        "sell" => Ok(TradeSide::Sell),
        other => bail!("unknown side '{}', expected buy or sell", other),
    }
}
