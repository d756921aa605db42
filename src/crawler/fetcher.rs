use reqwest::{Client, StatusCode};

use crate::config::Config;
use crate::crawler::models::ListingSummary;
use crate::crawler::parser;
use crate::error::FetchError;

/// Where pages and detail bodies come from. The crawl loop is generic
/// over this so tests can drive it from canned responses.
#[allow(async_fn_in_trait)]
pub trait CarSource {
    async fn fetch_page(&self, offset: u32) -> Result<Vec<ListingSummary>, FetchError>;
    async fn fetch_detail(&self, series_id: u64) -> Result<String, FetchError>;
}

/// Production source backed by reqwest against the live endpoints.
pub struct HttpSource {
    client: Client,
    cfg: Config,
}

impl HttpSource {
    pub fn new(cfg: Config) -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(cfg.user_agent.as_str()).build()?;
        Ok(Self { client, cfg })
    }

    async fn get_body(&self, request: reqwest::RequestBuilder) -> Result<String, FetchError> {
        let response = request.send().await.map_err(classify)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(FetchError::Transient(format!("upstream returned {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::Schema(format!("unexpected status {status}")));
        }

        response.text().await.map_err(classify)
    }
}

impl CarSource for HttpSource {
    async fn fetch_page(&self, offset: u32) -> Result<Vec<ListingSummary>, FetchError> {
        let body = self
            .get_body(
                self.client
                    .get(&self.cfg.rank_endpoint)
                    .query(&self.cfg.rank_filters())
                    .query(&[("offset", offset.to_string())]),
            )
            .await?;

        parser::parse_rank_page(&body)
    }

    async fn fetch_detail(&self, series_id: u64) -> Result<String, FetchError> {
        self.get_body(self.client.get(self.cfg.detail_url(series_id)))
            .await
    }
}

/// Connection-level trouble is worth retrying; a response we reached but
/// could not decode is not.
fn classify(e: reqwest::Error) -> FetchError {
    if e.is_decode() {
        FetchError::Schema(e.to_string())
    } else {
        FetchError::Transient(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_filters_carry_the_fixed_query() {
        let cfg = Config {
            rank_endpoint: String::new(),
            detail_endpoint: "https://www.dongchedi.com/auto/params-carIds-x".to_string(),
            city_name: "海口".to_string(),
            rank_data_type: 11,
            page_size: 10,
            user_agent: String::new(),
            sink_path: "temp.csv".into(),
            cursor_path: "spiderPage.txt".into(),
            database_url: String::new(),
            delay_ms: 0,
            max_retries: 0,
            backoff_base_ms: 0,
        };

        let filters = cfg.rank_filters();
        let get = |k: &str| filters.iter().find(|(key, _)| *key == k).map(|(_, v)| v.clone());

        assert_eq!(get("count").as_deref(), Some("10"));
        assert_eq!(get("rank_data_type").as_deref(), Some("11"));
        assert_eq!(get("city_name").as_deref(), Some("海口"));
        assert_eq!(get("nation").as_deref(), Some("0"));

        assert_eq!(cfg.detail_url(5207), "https://www.dongchedi.com/auto/params-carIds-x-5207");
    }
}
