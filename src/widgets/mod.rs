// Presentational widgets; they render numbers computed elsewhere
pub mod bar_chart;
pub mod stat_card;
pub mod status_badge;

pub use bar_chart::{ShareList, VolumeChart};
pub use stat_card::StatCard;
