/// CLI argument parsing and command handling

use clap::{Parser, Subcommand};

use crate::core::TimeWindow;

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "smsgw")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long, global = true, env = "SMSGW_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session token
    Login {
        /// Username or email
        #[arg(short, long)]
        username: String,

        /// Password (prompted for when omitted)
        #[arg(short, long, env = "SMSGW_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session token
    Logout,

    /// Create an account and sign in
    Register {
        #[arg(long)]
        email: String,

        #[arg(short, long)]
        username: String,

        /// Display name
        #[arg(long, default_value = "")]
        name: String,

        /// Password, at least 8 characters (prompted for when omitted)
        #[arg(short, long, env = "SMSGW_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Show the signed-in user and wallet balance
    Whoami,

    /// SMS commands
    Sms {
        #[command(subcommand)]
        command: SmsCommands,
    },

    /// Print new messages as they arrive
    Watch {
        /// Poll interval, e.g. "5s" (defaults to the live refresh setting)
        #[arg(short, long)]
        interval: Option<humantime::Duration>,

        /// Only show messages whose content matches this regex
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// SIM card commands
    Sims {
        #[command(subcommand)]
        command: SimCommands,
    },

    /// Wallet commands
    Wallet {
        #[command(subcommand)]
        command: WalletCommands,
    },

    /// API key commands
    Keys {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Message analytics over a trailing window
    Analytics {
        /// 7d, 30d or 90d
        #[arg(short, long, default_value = "7d")]
        window: TimeWindow,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum SmsCommands {
    /// List messages, newest first
    List {
        /// Maximum number of messages to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Only show messages whose content or numbers match this regex
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Send a message
    Send {
        /// Recipient number, e.g. +15550100123
        to: String,

        /// Message text
        message: String,

        /// SIM to send from (defaults to the first active SIM with quota)
        #[arg(long)]
        sim: Option<i64>,
    },

    /// Show one or more messages
    Show {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Today's counters and delivery rate
    Stats,
}

#[derive(Subcommand)]
pub enum SimCommands {
    /// List SIM cards
    List,

    /// Show a SIM card
    Show { id: i64 },

    /// Flip a SIM between active and inactive
    Toggle { id: i64 },

    /// Activate a SIM
    Activate { id: i64 },

    /// Deactivate a SIM
    Deactivate { id: i64 },

    /// Delete a SIM
    Delete {
        id: i64,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List SIM offers available for purchase
    Market,

    /// Buy a SIM from the marketplace
    Buy {
        /// Offer id from `smsgw sims market`
        offer: String,
    },
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Show the wallet balance
    Balance,

    /// List wallet transactions
    History {
        /// Maximum number of transactions to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Add funds to the wallet
    TopUp {
        /// Amount in dollars
        amount: rust_decimal::Decimal,
    },
}

#[derive(Subcommand)]
pub enum KeyCommands {
    /// List API keys (masked)
    List {
        /// Show full keys
        #[arg(long)]
        reveal: bool,
    },

    /// Create an API key
    Create { name: String },

    /// Delete an API key
    Delete {
        id: i64,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// View configuration
    View,

    /// Set the backend base URL
    SetUrl { url: String },

    /// Print the config, token and log file locations
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analytics_window() {
        let cli = Cli::try_parse_from(["smsgw", "analytics", "--window", "30d", "--json"]).unwrap();
        match cli.command {
            Some(Commands::Analytics { window, json }) => {
                assert_eq!(window, TimeWindow::Month);
                assert!(json);
            }
            _ => panic!("expected analytics"),
        }

        assert!(Cli::try_parse_from(["smsgw", "analytics", "--window", "1y"]).is_err());
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::try_parse_from(["smsgw", "sms", "send", "+15550100123", "hello there", "--sim", "4"]).unwrap();
        match cli.command {
            Some(Commands::Sms {
                command: SmsCommands::Send { to, message, sim },
            }) => {
                assert_eq!(to, "+15550100123");
                assert_eq!(message, "hello there");
                assert_eq!(sim, Some(4));
            }
            _ => panic!("expected sms send"),
        }
    }
}
