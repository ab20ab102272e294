use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use tracing::{info, warn};

use papertrade_rs::engine::composer::{OrderComposer, SubmitOutcome};
use papertrade_rs::engine::types::{Instrument, InstrumentClass, OrderType, Quote, Rejection, Side};
use papertrade_rs::market_data::adapters::alpha_vantage::AlphaVantageAdapter;
use papertrade_rs::market_data::adapters::coingecko::CoinGeckoAdapter;
use papertrade_rs::market_data::adapters::static_rates::StaticRates;
use papertrade_rs::market_data::adapters::QuoteFeed;
use papertrade_rs::market_data::fallback::Fallback;
use papertrade_rs::market_data::router::{fetch_many, QuotePoller};
use papertrade_rs::persist::export::write_trades_csv;
use papertrade_rs::persist::paper::PaperLedger;
use papertrade_rs::persist::portfolio;
use papertrade_rs::persist::postgres::PostgresTradeStore;
use papertrade_rs::persist::Ledger;
use papertrade_rs::settings::Settings;
use papertrade_rs::telemetry;
use papertrade_rs::watchlist::{self, Watchlist, WatchlistItem};

const FIRST_QUOTE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClassArg {
    Crypto,
    Stock,
    Forex,
}

impl From<ClassArg> for InstrumentClass {
    fn from(arg: ClassArg) -> Self {
        match arg {
            ClassArg::Crypto => InstrumentClass::Crypto,
            ClassArg::Stock => InstrumentClass::Stock,
            ClassArg::Forex => InstrumentClass::Forex,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "papertrade", about = "Compose and submit paper trades against live quotes")]
struct Args {
    /// Settings file (TOML); defaults to config/default.toml
    #[arg(long)]
    config: Option<String>,
    /// Asset id in the feed's scheme (CoinGecko id, stock ticker, "EURUSD")
    #[arg(long, default_value = "bitcoin")]
    asset: String,
    #[arg(long)]
    symbol: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long, value_enum, default_value_t = ClassArg::Crypto)]
    class: ClassArg,
    /// Static prices and an in-memory ledger; no network, no database
    #[arg(long)]
    offline: bool,
}

fn offline_rates() -> StaticRates {
    StaticRates::forex()
        .with_price("bitcoin", Decimal::from(50_000))
        .with_price("ethereum", Decimal::from(3_000))
        .with_price("AAPL", Decimal::from(175))
        .with_price("MSFT", Decimal::from(410))
}

// What `watch` can find without network access
fn offline_catalog() -> Vec<WatchlistItem> {
    vec![
        WatchlistItem::new("bitcoin", "BTC", "Bitcoin", InstrumentClass::Crypto),
        WatchlistItem::new("ethereum", "ETH", "Ethereum", InstrumentClass::Crypto),
        WatchlistItem::new("AAPL", "AAPL", "Apple Inc", InstrumentClass::Stock),
        WatchlistItem::new("MSFT", "MSFT", "Microsoft Corp", InstrumentClass::Stock),
        WatchlistItem::new("EURUSD", "EUR/USD", "Euro / US Dollar", InstrumentClass::Forex),
        WatchlistItem::new("GBPUSD", "GBP/USD", "British Pound / US Dollar", InstrumentClass::Forex),
    ]
}

fn build_feed(class: InstrumentClass, offline: bool, settings: &Settings) -> Arc<dyn QuoteFeed> {
    if offline {
        return Arc::new(offline_rates());
    }
    match class {
        InstrumentClass::Crypto => Arc::new(Fallback::new(CoinGeckoAdapter::new(&settings.coingecko_url), offline_rates())),
        InstrumentClass::Stock => Arc::new(Fallback::new(
            AlphaVantageAdapter::new(&settings.alpha_vantage_url, &settings.alpha_vantage_key),
            offline_rates(),
        )),
        InstrumentClass::Forex => Arc::new(StaticRates::forex()),
    }
}

async fn build_ledger(args: &Args, settings: &Settings) -> anyhow::Result<Arc<dyn Ledger>> {
    match (&settings.database_url, args.offline) {
        (Some(url), false) => {
            let store = PostgresTradeStore::connect(url, &settings.user_id, settings.starting_balance)
                .await
                .context("connecting to trades database")?;
            Ok(Arc::new(store))
        }
        _ => {
            info!(balance = %settings.starting_balance, "Using in-memory paper ledger");
            Ok(Arc::new(PaperLedger::new(&settings.user_id, settings.starting_balance)))
        }
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  buy | sell            - Switch order side");
    println!("  market                - Market order at the live quote");
    println!("  limit <price>         - Limit order at <price>");
    println!("  qty <amount>          - Set quantity");
    println!("  pct <0-100>           - Quick-select a share of balance (buy) or holdings (sell)");
    println!("  max                   - Buy as much as the balance allows");
    println!("  show                  - Show draft, total and whether it can be submitted");
    println!("  submit                - Submit the order");
    println!("  history               - List booked trades");
    println!("  portfolio             - Show positions and P/L");
    println!("  export <path>         - Write trade history as CSV");
    println!("  watch <name|symbol>   - Add an asset to the watchlist");
    println!("  unwatch <id>          - Remove an asset from the watchlist");
    println!("  watchlist             - Show watched assets with prices");
    println!("  quit, q               - Exit");
}

fn print_draft(composer: &OrderComposer, quote: &Quote, balance: Decimal) {
    let draft = composer.draft();
    let eval = composer.evaluate(quote, balance);
    let instrument = composer.instrument();

    println!("\n=== {} ({}) ===", instrument.name, instrument.symbol);
    println!("Current price:     ${:.2}", quote.price);
    println!("Available balance: ${:.2}", balance);
    println!("Side: {:?}  Type: {:?}", draft.side, draft.order_type);
    if draft.order_type == OrderType::Limit {
        println!("Limit price: {:?}", draft.limit_price);
    }
    println!("Quantity: {:?}", draft.quantity);
    println!("Total: ${:.2}", eval.notional_total);
    match eval.rejection() {
        None => println!("Ready to submit"),
        Some(Rejection::ExceedsLimit) => println!("⚠️  Amount is too large"),
        Some(Rejection::ZeroQuantity) => println!("Enter a quantity to trade"),
        Some(Rejection::InsufficientFunds { .. }) => println!("⚠️  Insufficient balance for this trade"),
    }
    println!("========================\n");
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

// Live listings for watchlist search; absent when offline
struct MarketSources {
    coingecko: CoinGeckoAdapter,
    alpha_vantage: AlphaVantageAdapter,
}

struct Session {
    composer: OrderComposer,
    ledger: Arc<dyn Ledger>,
    feeds: HashMap<InstrumentClass, Arc<dyn QuoteFeed>>,
    markets: Option<MarketSources>,
    watchlist: Watchlist,
    watchlist_path: PathBuf,
}

impl Session {
    fn feed_for(&self, class: InstrumentClass) -> Arc<dyn QuoteFeed> {
        self.feeds
            .get(&class)
            .cloned()
            .unwrap_or_else(|| Arc::new(offline_rates()))
    }

    async fn search(&self, query: &str) -> Vec<WatchlistItem> {
        let Some(markets) = &self.markets else {
            return watchlist::search(query, &offline_catalog());
        };
        let (cryptos, stocks) = tokio::join!(markets.coingecko.markets(), markets.alpha_vantage.popular_stocks());
        let cryptos = cryptos.unwrap_or_else(|e| {
            warn!(error = %e, "Crypto listing unavailable");
            Vec::new()
        });
        watchlist::search_markets(query, &cryptos, &stocks)
    }

    /// Run one command. Errors end the command, not the session.
    async fn run(&mut self, command: &str, arg: Option<&str>, quote: Quote) -> anyhow::Result<Flow> {
        if command.is_empty() {
            return Ok(Flow::Continue);
        }
        let balance = self.ledger.available_balance().await?;
        let composer = &mut self.composer;

        match command {
            "help" | "h" => print_help(),
            "buy" => {
                composer.set_side(Side::Buy);
            }
            "sell" => {
                composer.set_side(Side::Sell);
            }
            "market" => {
                composer.set_order_type(OrderType::Market);
            }
            "limit" => {
                composer.set_order_type(OrderType::Limit);
                if let Some(price) = arg {
                    composer.set_limit_price(price);
                }
            }
            "qty" => {
                composer.set_quantity(arg.unwrap_or(""));
                print_draft(composer, &quote, balance);
            }
            "pct" => match arg.and_then(|p| Decimal::from_str(p).ok()) {
                Some(percent) => {
                    let owned = match composer.draft().side {
                        Side::Sell => Some(self.ledger.owned_quantity(&composer.instrument().id).await?),
                        Side::Buy => None,
                    };
                    composer.quick_select(percent, &quote, balance, owned);
                    print_draft(composer, &quote, balance);
                }
                None => println!("Usage: pct <0-100>"),
            },
            "max" => {
                composer.fill_max(&quote, balance);
                print_draft(composer, &quote, balance);
            }
            "show" => print_draft(composer, &quote, balance),
            "submit" => match composer.submit(self.ledger.as_ref(), &quote, balance).await {
                Ok(SubmitOutcome::Executed(record)) => {
                    let verb = match record.side {
                        Side::Buy => "bought",
                        Side::Sell => "sold",
                    };
                    println!(
                        "✅ Successfully {} {} {} at ${:.2} per unit (id {})",
                        verb, record.quantity, record.symbol, record.price, record.id
                    );
                }
                Ok(SubmitOutcome::Ignored) => println!("A submission is already in progress"),
                Err(e) => println!("❌ {}", e),
            },
            "history" => {
                let trades = self.ledger.trades().await?;
                if trades.is_empty() {
                    println!("No trades yet");
                }
                for t in trades {
                    println!(
                        "{} {} {:?} {:?} {} @ {} = {} ({})",
                        t.created_at.format("%Y-%m-%d %H:%M:%S"),
                        t.symbol,
                        t.side,
                        t.order_type,
                        t.quantity,
                        t.price,
                        t.total,
                        t.id
                    );
                }
            }
            "portfolio" => {
                let trades = self.ledger.trades().await?;
                let held = portfolio::holdings(&trades);
                let ids: Vec<&str> = held.iter().map(|h| h.asset_id.as_str()).collect();
                let class = composer.instrument().class;
                let feed = self.feed_for(class);
                let prices: HashMap<String, Decimal> = fetch_many(feed.as_ref(), &ids)
                    .await
                    .into_iter()
                    .map(|(id, q)| (id, q.price))
                    .collect();
                let valued = portfolio::valuation(held, &prices);
                println!("\n=== Portfolio ===");
                for a in &valued.assets {
                    println!(
                        "{:<8} qty {} avg ${:.2} now ${:.2} value ${:.2} P/L ${:.2} ({}%)",
                        a.holding.symbol,
                        a.holding.quantity,
                        a.holding.average_buy_price,
                        a.current_price,
                        a.total_value,
                        a.profit_loss,
                        a.profit_loss_percentage
                    );
                }
                println!("Total value: ${:.2}  Total P/L: ${:.2}", valued.total_value, valued.total_profit);
                println!("Cash: ${:.2}", balance);
            }
            "export" => match arg {
                Some(path) => {
                    let trades = self.ledger.trades().await?;
                    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path))?;
                    write_trades_csv(&trades, file)?;
                    println!("Wrote {} trades to {}", trades.len(), path);
                }
                None => println!("Usage: export <path>"),
            },
            "watch" => match arg {
                Some(query) => {
                    let hits = self.search(query).await;
                    let exact = hits
                        .iter()
                        .find(|h| h.id.eq_ignore_ascii_case(query) || h.symbol.eq_ignore_ascii_case(query));
                    let pick = match (exact, hits.as_slice()) {
                        (Some(item), _) => Some(item.clone()),
                        (None, [only]) => Some(only.clone()),
                        _ => None,
                    };
                    match pick {
                        Some(item) if self.watchlist.add(item.clone()) => {
                            self.watchlist.save(&self.watchlist_path)?;
                            println!("Watching {} ({})", item.name, item.symbol);
                        }
                        Some(item) => println!("{} is already on the watchlist", item.symbol),
                        None if hits.is_empty() => println!("No assets match '{}'", query),
                        None => {
                            println!("Several assets match '{}'; use an id or symbol:", query);
                            for h in &hits {
                                println!("  {:<12} {:<8} {}", h.id, h.symbol, h.name);
                            }
                        }
                    }
                }
                None => println!("Usage: watch <name|symbol>"),
            },
            "unwatch" => match arg {
                Some(id) => match self.watchlist.remove(id) {
                    Some(item) => {
                        self.watchlist.save(&self.watchlist_path)?;
                        println!("Removed {} from the watchlist", item.symbol);
                    }
                    None => println!("'{}' is not on the watchlist", id),
                },
                None => println!("Usage: unwatch <id>"),
            },
            "watchlist" => {
                if self.watchlist.items().is_empty() {
                    println!("Watchlist is empty");
                }
                let quotes = self.watchlist.quotes(|class| self.feed_for(class)).await;
                println!("\n=== Watchlist ===");
                for item in self.watchlist.items() {
                    match quotes.iter().find(|(quoted, _)| quoted.id == item.id) {
                        Some((_, q)) => println!("{:<12} {:<8} {:<24} ${}", item.id, item.symbol, item.name, q.price),
                        None => println!("{:<12} {:<8} {:<24} (no quote)", item.id, item.symbol, item.name),
                    }
                }
            }
            "quit" | "q" | "exit" => {
                println!("Goodbye!");
                return Ok(Flow::Quit);
            }
            other => {
                warn!(command = other, "Unknown command");
                println!("Unknown command. Type 'help' for available commands.");
            }
        }
        Ok(Flow::Continue)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    telemetry::init_tracing(&settings.log_filter)?;
    telemetry::init_metrics(settings.metrics_port)?;

    let class = InstrumentClass::from(args.class);
    let symbol = args.symbol.clone().unwrap_or_else(|| args.asset.to_uppercase());
    let name = args.name.clone().unwrap_or_else(|| symbol.clone());
    let instrument = Instrument::new(&args.asset, &symbol, &name, class);

    let feeds: HashMap<InstrumentClass, Arc<dyn QuoteFeed>> =
        [InstrumentClass::Crypto, InstrumentClass::Stock, InstrumentClass::Forex]
            .into_iter()
            .map(|c| (c, build_feed(c, args.offline, &settings)))
            .collect();
    let ledger = build_ledger(&args, &settings).await?;
    let watchlist_path = PathBuf::from(&settings.watchlist_path);
    let watchlist = Watchlist::load(&watchlist_path).unwrap_or_else(|e| {
        warn!(path = %watchlist_path.display(), error = %e, "Unreadable watchlist, using defaults");
        Watchlist::default()
    });
    let markets = (!args.offline).then(|| MarketSources {
        coingecko: CoinGeckoAdapter::new(&settings.coingecko_url),
        alpha_vantage: AlphaVantageAdapter::new(&settings.alpha_vantage_url, &settings.alpha_vantage_key),
    });

    let feed = feeds
        .get(&class)
        .cloned()
        .unwrap_or_else(|| Arc::new(offline_rates()));
    let mut poller = QuotePoller::spawn(feed, &instrument.id, Duration::from_millis(settings.poll_interval_ms));
    let first = tokio::time::timeout(FIRST_QUOTE_TIMEOUT, poller.first_quote())
        .await
        .ok()
        .flatten()
        .with_context(|| format!("no quote for '{}' within {:?}", instrument.id, FIRST_QUOTE_TIMEOUT))?;

    let mut session = Session {
        composer: OrderComposer::new(instrument, &first),
        ledger,
        feeds,
        markets,
        watchlist,
        watchlist_path,
    };
    info!(asset = %session.composer.instrument().id, price = %first.price, "Ready");
    print_help();

    loop {
        print!("\npapertrade> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let mut parts = input.split_whitespace();
        let command = parts.next().unwrap_or("").to_lowercase();
        let arg = parts.next();

        // Always price against the quote as of this command
        let quote = poller.latest().unwrap_or(first);
        match session.run(&command, arg, quote).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => {
                warn!(command = %command, error = %e, "Command failed");
                println!("❌ {:#}", e);
            }
        }
    }

    Ok(())
}
