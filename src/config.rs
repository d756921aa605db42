use std::env;
use std::path::PathBuf;

const DEFAULT_RANK_ENDPOINT: &str = "https://www.dongchedi.com/motor/pc/car/rank_data";
const DEFAULT_DETAIL_ENDPOINT: &str = "https://www.dongchedi.com/auto/params-carIds-x";
const DEFAULT_CITY_NAME: &str = "海口";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36 Edg/140.0.0.0";

#[derive(Debug, Clone)]
pub struct Config {
    pub rank_endpoint: String,
    pub detail_endpoint: String,
    pub city_name: String,
    pub rank_data_type: u32,
    pub page_size: u32,
    pub user_agent: String,
    pub sink_path: PathBuf,
    pub cursor_path: PathBuf,
    pub database_url: String,
    pub delay_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            rank_endpoint: env_or("RANK_ENDPOINT", DEFAULT_RANK_ENDPOINT),
            detail_endpoint: env_or("DETAIL_ENDPOINT", DEFAULT_DETAIL_ENDPOINT),
            city_name: env_or("CITY_NAME", DEFAULT_CITY_NAME),
            rank_data_type: env_or("RANK_DATA_TYPE", "11").parse()?,
            page_size: env_or("PAGE_SIZE", "10").parse()?,
            user_agent: env_or("USER_AGENT", DEFAULT_USER_AGENT),
            sink_path: env_or("SINK_PATH", "temp.csv").into(),
            cursor_path: env_or("CURSOR_PATH", "spiderPage.txt").into(),
            database_url: env_or("DATABASE_URL", "sqlite://cars.db"),
            delay_ms: env_or("DELAY_MS", "300").parse()?,
            max_retries: env_or("MAX_RETRIES", "3").parse()?,
            backoff_base_ms: env_or("BACKOFF_BASE_MS", "500").parse()?,
        })
    }

    /// Fixed filter parameters the ranking endpoint expects alongside
    /// `offset`. Only city, page size and ranking type are meaningful;
    /// the rest must be present but empty.
    pub fn rank_filters(&self) -> Vec<(&'static str, String)> {
        vec![
            ("aid", "1839".to_string()),
            ("app_name", "auto_web_pc".to_string()),
            ("city_name", self.city_name.clone()),
            ("count", self.page_size.to_string()),
            ("month", String::new()),
            ("new_energy_type", String::new()),
            ("rank_data_type", self.rank_data_type.to_string()),
            ("brand_id", String::new()),
            ("price", String::new()),
            ("manufacturer", String::new()),
            ("series_type", String::new()),
            ("nation", "0".to_string()),
        ]
    }

    pub fn detail_url(&self, series_id: u64) -> String {
        format!("{}-{}", self.detail_endpoint, series_id)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
