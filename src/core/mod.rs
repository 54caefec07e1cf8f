pub mod analytics;
pub mod api_keys;
pub mod client;
pub mod error;
pub mod models;
pub mod overview;
pub mod poller;
pub mod session;
pub mod sims;
pub mod sms;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use analytics::{AnalyticsReport, PrefixTable, TimeWindow};
pub use api_keys::ApiKeyManager;
pub use client::{GatewayApi, GatewayClient};
pub use error::ClientError;
pub use overview::{LiveSeries, Overview};
pub use poller::PollHandle;
pub use session::{Session, TokenStore};
pub use sims::{PurchaseError, SimManager, SimRoster};
pub use sms::SmsCenter;
pub use wallet::WalletManager;
