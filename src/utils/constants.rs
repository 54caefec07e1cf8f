/// SMS gateway catalog data and tuning constants

/// Backend used when neither the config file nor the environment names one
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Refresh interval for list views (messages, SIMs, wallet)
pub const DEFAULT_LIST_REFRESH: &str = "30s";

/// Refresh interval for the live activity series on the dashboard
pub const DEFAULT_LIVE_REFRESH: &str = "3s";

/// Samples kept by the live activity series
pub const LIVE_SERIES_LEN: usize = 30;

/// Messages shown in the dashboard's recent activity list
pub const RECENT_MESSAGES: usize = 5;

pub const TOP_UP_PRESETS: &[u32] = &[10, 25, 50, 100, 250, 500];
pub const TOP_UP_MIN: u32 = 5;
pub const TOP_UP_MAX: u32 = 5000;

/// Flat monthly cost per SIM used for the inventory estimate
pub const SIM_MONTHLY_COST: u32 = 25;

/// Validity of a newly provisioned SIM
pub const SIM_VALIDITY_DAYS: i64 = 30;

pub const SMS_MAX_LEN: usize = 1600;
pub const RECIPIENT_MIN_LEN: usize = 10;
pub const RECIPIENT_MAX_LEN: usize = 15;

pub const API_KEY_NAME_MAX_LEN: usize = 100;

/// Bucket for numbers that match no dialing prefix
pub const OTHER_COUNTRIES: &str = "Others";

/// Dialing prefixes used for the per-country breakdown
///
/// No entry may be a prefix of another; `+1` is shared by the whole North
/// American Numbering Plan and gets a single bucket.
pub const COUNTRY_PREFIXES: &[(&str, &str)] = &[
    ("+1", "US/Canada (NANP)"),
    ("+44", "United Kingdom"),
    ("+49", "Germany"),
    ("+33", "France"),
    ("+34", "Spain"),
    ("+39", "Italy"),
    ("+81", "Japan"),
    ("+86", "China"),
    ("+91", "India"),
    ("+61", "Australia"),
    ("+55", "Brazil"),
    ("+52", "Mexico"),
    ("+27", "South Africa"),
    ("+234", "Nigeria"),
    ("+254", "Kenya"),
    ("+971", "United Arab Emirates"),
];

/// A SIM offered in the marketplace
#[derive(Debug, Clone, PartialEq)]
pub struct SimOffer {
    pub id: &'static str,
    pub country: &'static str,
    pub provider: &'static str,
    pub number: &'static str,
    /// Price in cents
    pub price_cents: i64,
    /// Data allowance in tenths of a GB
    pub data_tenths_gb: u32,
    pub messages_limit: u32,
    /// Rating in tenths of a star
    pub rating_tenths: u8,
    pub coverage: &'static str,
}

impl SimOffer {
    pub fn price(&self) -> rust_decimal::Decimal {
        rust_decimal::Decimal::new(self.price_cents, 2)
    }

    /// Data plan label sent to the backend, e.g. "5.0GB"
    pub fn data_plan(&self) -> String {
        format!("{}.{}GB", self.data_tenths_gb / 10, self.data_tenths_gb % 10)
    }

    pub fn rating(&self) -> String {
        format!("{}.{}", self.rating_tenths / 10, self.rating_tenths % 10)
    }
}

pub const MARKETPLACE: &[SimOffer] = &[
    SimOffer {
        id: "US-001",
        country: "United States",
        provider: "T-Mobile",
        number: "+1-555-0199",
        price_cents: 2500,
        data_tenths_gb: 50,
        messages_limit: 1000,
        rating_tenths: 48,
        coverage: "99%",
    },
    SimOffer {
        id: "UK-001",
        country: "United Kingdom",
        provider: "EE",
        number: "+44-20-7946-0999",
        price_cents: 3200,
        data_tenths_gb: 40,
        messages_limit: 800,
        rating_tenths: 47,
        coverage: "98%",
    },
    SimOffer {
        id: "DE-001",
        country: "Germany",
        provider: "O2",
        number: "+49-30-12345999",
        price_cents: 2800,
        data_tenths_gb: 60,
        messages_limit: 1200,
        rating_tenths: 46,
        coverage: "97%",
    },
    SimOffer {
        id: "FR-001",
        country: "France",
        provider: "Orange",
        number: "+33-1-23-45-67-99",
        price_cents: 3000,
        data_tenths_gb: 45,
        messages_limit: 900,
        rating_tenths: 45,
        coverage: "96%",
    },
    SimOffer {
        id: "JP-001",
        country: "Japan",
        provider: "SoftBank",
        number: "+81-3-1234-5999",
        price_cents: 3500,
        data_tenths_gb: 30,
        messages_limit: 600,
        rating_tenths: 49,
        coverage: "99%",
    },
    SimOffer {
        id: "AU-001",
        country: "Australia",
        provider: "Telstra",
        number: "+61-2-9999-9999",
        price_cents: 3300,
        data_tenths_gb: 55,
        messages_limit: 1100,
        rating_tenths: 44,
        coverage: "95%",
    },
];

/// Look up a marketplace offer by id (case-insensitive)
pub fn find_offer(id: &str) -> Option<&'static SimOffer> {
    MARKETPLACE.iter().find(|offer| offer.id.eq_ignore_ascii_case(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_formatting() {
        let offer = find_offer("fr-001").unwrap();
        assert_eq!(offer.price(), rust_decimal::Decimal::new(30, 0));
        assert_eq!(offer.data_plan(), "4.5GB");
        assert_eq!(offer.rating(), "4.5");
        assert!(find_offer("XX-001").is_none());
    }
}
