//! Command line arguments of the `opium` tool.
//!
//! Credentials and endpoints come from the environment (see
//! [`opium_sdk::config::Config`]), the command line selects what to do.

use clap::{Parser, Subcommand, ValueEnum};
use fastnum::{UD64, decimal::Context};
use opium_sdk::types::Side;

use crate::error::Error;

#[derive(Debug, Parser)]
#[command(name = "opium")]
#[command(about = "Opium exchange command line client")]
pub struct Cli {
    /// Use the test deployment, overrides OPIUM_TESTNET
    #[arg(long, global = true)]
    pub testnet: bool,

    /// Number of book levels to print (0 = all)
    #[arg(long, global = true, default_value = "10")]
    pub depth: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for Side {
    fn from(value: SideArg) -> Self {
        match value {
            SideArg::Buy => Side::Buy,
            SideArg::Sell => Side::Sell,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check connectivity and print the exchange configuration
    Network,

    /// List traded tickers
    Tickers,

    /// List instruments of traded tickers
    Instruments,

    /// Print wallet balances
    Balance,

    /// Place a limit order
    Order {
        /// Product title of the ticker, e.g. OEX-FUT-1DEC-135.00
        instrument: String,

        #[arg(value_enum)]
        side: SideArg,

        /// Limit price
        price: String,

        /// Number of contracts
        quantity: u64,
    },

    /// Cancel orders by their IDs
    Cancel {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Print the order book of a ticker
    Book {
        ticker: String,

        /// Keep printing book updates
        #[arg(short, long)]
        follow: bool,
    },

    /// Print public trades of a ticker
    Trades {
        ticker: String,

        /// Keep printing new trades
        #[arg(short, long)]
        follow: bool,

        /// With --follow, skip the trades present at subscription time
        #[arg(long)]
        new_only: bool,
    },

    /// Print open orders of the account on a ticker
    Orders {
        ticker: String,

        /// Keep printing order status transitions
        #[arg(short, long)]
        follow: bool,
    },

    /// Print fills of the account on a ticker
    Fills {
        ticker: String,

        /// Keep printing new fills
        #[arg(short, long)]
        follow: bool,
    },
}

impl Command {
    /// Whether the command needs wallet credentials.
    pub fn is_private(&self) -> bool {
        matches!(
            self,
            Command::Balance
                | Command::Order { .. }
                | Command::Cancel { .. }
                | Command::Orders { .. }
                | Command::Fills { .. }
        )
    }
}

pub fn parse_price(price: &str) -> Result<UD64, Error> {
    let value = UD64::from_str(price, Context::default())
        .map_err(|_| Error::InvalidPrice(price.to_string()))?;
    if value == UD64::ZERO {
        return Err(Error::InvalidPrice(price.to_string()));
    }
    Ok(value)
}
