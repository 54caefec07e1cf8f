pub mod dashboard;
pub mod login;

// Each view renders through `impl Dashboard` blocks in its own file:
// - Dashboard: counters, live activity sparkline, recent messages
// - SMS Center: daily counters and the message list
// - SIM Manager: inventory counters, SIM list with in-flight purchases
// - Wallet: balance, ledger totals and transactions
// - API Keys: key list with masking
// - Analytics: daily volume, country breakdown, peak hours
mod analytics;
mod api_keys;
mod dialogs;
mod overview;
mod sims;
mod sms;
mod wallet;

pub use dashboard::Dashboard;
