//! Command line client for the Opium exchange.
//!
//! Public commands work without credentials, account commands read
//! `OPIUM_PUBLIC_KEY` and `OPIUM_PRIVATE_KEY` from the environment or `.env`.

mod config;
mod error;

use std::{process::exit, time::Duration};

use clap::Parser;
use futures::StreamExt;
use opium_sdk::{
    Network,
    config::{Config, DEFAULT_TIMEOUT_SECONDS},
    rest::{OpiumClient, PublicClient},
    state::OrderUpdate,
    stream::{self, AccountAuth, OpiumStream},
    types::{self, AccountFill, AccountOrder, Instrument, OrderBook, Trade},
};
use tracing::{error, info};

use config::{Cli, Command};
use error::{Error, Result};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(cli).await {
        error!(%e, "command failed");
        exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Credentials are optional for public commands
    let config = match Config::from_env() {
        Ok(mut config) => {
            config.testnet |= cli.testnet;
            Some(config)
        }
        Err(e) if cli.command.is_private() => return Err(e.into()),
        Err(_) => None,
    };

    let (network, timeout) = match &config {
        Some(config) => (config.network()?, config.timeout()),
        None if cli.testnet => (
            Network::testnet(),
            Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        ),
        None => (
            Network::mainnet(),
            Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        ),
    };
    let public = PublicClient::new(network, timeout)?;
    let streams = OpiumStream::with_public(public.clone());

    let client = match &config {
        Some(config) if cli.command.is_private() => {
            config.validate()?;
            Some(OpiumClient::with_public(
                public.clone(),
                &config.public_key,
                &config.private_key,
            )?)
        }
        _ => None,
    };
    let private = || client.as_ref().ok_or(Error::MissingCredentials);

    match cli.command {
        Command::Network => {
            let meta = public.check_network().await?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
        Command::Tickers => {
            for ticker in public.tickers().await? {
                println!(
                    "{:<30} {:<40} {}",
                    ticker.product_title,
                    ticker.bot_title.as_deref().unwrap_or("-"),
                    ticker.hash
                );
            }
        }
        Command::Instruments => {
            let instruments: Vec<Instrument> = public
                .tickers()
                .await?
                .iter()
                .flat_map(|t| Instrument::from_ticker(t, types::QUOTE_CURRENCY))
                .collect();
            println!("{}", serde_json::to_string_pretty(&instruments)?);
        }
        Command::Balance => {
            for balance in private()?.balance().await? {
                println!(
                    "{:<10} balance: {:<30} available: {}",
                    balance.currency,
                    balance.balance.to_string(),
                    balance.available
                );
            }
        }
        Command::Order {
            instrument,
            side,
            price,
            quantity,
        } => {
            let price = config::parse_price(&price)?;
            let client = private()?;
            client.init().await?;
            let placed = client
                .create_order(&instrument, side.into(), price, quantity)
                .await?;
            for order in placed {
                println!("{}", order.id);
            }
        }
        Command::Cancel { ids } => {
            private()?.cancel_orders(&ids).await?;
            info!(count = ids.len(), "cancel requested");
        }
        Command::Book { ticker, follow } => {
            if follow {
                let mut updates = streams.order_book_updates(&ticker).await?;
                while let Some(book) = updates.next().await {
                    print_book(&book?, cli.depth);
                }
                return Err(Error::StreamClosed);
            }
            print_book(&streams.order_book(&ticker).await?, cli.depth);
        }
        Command::Trades {
            ticker,
            follow,
            new_only,
        } => {
            if follow {
                let (mut rx, handle) = stream::spawn(streams.trades(&ticker, new_only).await?);
                while let Some(trades) = rx.recv().await {
                    trades.iter().for_each(print_trade);
                }
                handle.await??;
                return Err(Error::StreamClosed);
            }
            streams
                .latest_trades(&ticker)
                .await?
                .iter()
                .rev()
                .for_each(print_trade);
        }
        Command::Orders { ticker, follow } => {
            let auth = account_auth(private()?).await?;
            if follow {
                let (mut rx, handle) =
                    stream::spawn(streams.account_order_updates(&ticker, &auth).await?);
                while let Some(updates) = rx.recv().await {
                    updates.iter().for_each(print_update);
                }
                handle.await??;
                return Err(Error::StreamClosed);
            }
            streams
                .account_orders(&ticker, &auth)
                .await?
                .iter()
                .for_each(print_order);
        }
        Command::Fills { ticker, follow } => {
            let auth = account_auth(private()?).await?;
            if follow {
                let (mut rx, handle) = stream::spawn(streams.account_fills(&ticker, &auth).await?);
                while let Some(fills) = rx.recv().await {
                    fills.iter().for_each(print_fill);
                }
                handle.await??;
                return Err(Error::StreamClosed);
            }
            streams
                .account_trades(&ticker, &auth)
                .await?
                .iter()
                .for_each(print_fill);
        }
    }
    Ok(())
}

async fn account_auth(client: &OpiumClient) -> Result<AccountAuth> {
    let signature = client.generate_access_token().await?;
    Ok(AccountAuth::new(client.public_key(), signature))
}

fn print_book(book: &OrderBook, depth: usize) {
    let levels = |len: usize| if depth == 0 { len } else { depth.min(len) };

    println!("\n{:=^60}", format!(" ORDER BOOK @ {} ", book.last_update_id));
    println!("{:>25} │ {:<25}", "Price", "Volume");
    println!("{:-^60}", "");
    for (price, volume) in book.asks.iter().take(levels(book.asks.len())).rev() {
        println!("{:>25} │ {:<25} ASK", price.to_string(), volume.to_string());
    }
    println!("{:-^60}", "");
    for (price, volume) in book.bids.iter().take(levels(book.bids.len())) {
        println!("{:>25} │ {:<25} BID", price.to_string(), volume.to_string());
    }
}

fn print_trade(trade: &Trade) {
    println!(
        "{} {:<66} price: {:<14} amount: {}",
        trade.timestamp,
        trade.trade_id,
        trade.price.to_string(),
        trade.amount
    );
}

fn print_order(order: &AccountOrder) {
    println!(
        "{:<26} {:?} price: {:<14} quantity: {:<10} filled: {}",
        order.id,
        order.side(),
        order.price.to_string(),
        order.quantity.to_string(),
        order.filled()
    );
}

fn print_update(update: &OrderUpdate) {
    print!("{:<9} ", format!("{:?}", update.status).to_uppercase());
    print_order(&update.order);
}

fn print_fill(fill: &AccountFill) {
    println!(
        "{} {:?} {} price: {:<14} quantity: {:<10} order: {}",
        fill.create_time,
        fill.side,
        fill.instrument_name,
        fill.traded_price.to_string(),
        fill.traded_quantity.to_string(),
        fill.order_id.as_deref().unwrap_or("-")
    );
}
