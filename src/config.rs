use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv().ok(); // Load .env file if present
    Config {
        feed_base_url: get_env_or_default("FEED_BASE_URL", "http://searchfeed.adssquared.com"),
        affiliate_id: get_env_or_default("FEED_AFFILIATE_ID", "adsuser2000129"),
        default_market: get_env_or_default("FEED_DEFAULT_MARKET", "us"),
        bind_addr: get_env_or_default("BIND_ADDR", "0.0.0.0:3000"),
        request_timeout_secs: get_env_or_default("FEED_TIMEOUT_SECS", "10")
            .parse()
            .unwrap_or(10),
    }
});

pub struct Config {
    pub feed_base_url: String,
    pub affiliate_id: String,
    pub default_market: String,
    pub bind_addr: String,
    pub request_timeout_secs: u64,
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
