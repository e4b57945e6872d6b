use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use forecast_core::{AnalysisError, NewsItem, NewsSource};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::truncate_summary;

const BASE_URL: &str = "https://newsapi.org/v2";
const LOOKBACK_DAYS: i64 = 7;
const PAGE_SIZE: usize = 20;
/// Articles kept from one response
pub const MAX_ARTICLES: usize = 15;

/// Keyword search over general news outlets via NewsAPI `/everything`.
#[derive(Clone)]
pub struct NewsApiClient {
    api_key: String,
    client: Client,
}

impl NewsApiClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
        }
    }

    /// English articles from the last week matching the company name, or the
    /// symbol when the name is unknown, ordered by relevancy.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<NewsItem>, AnalysisError> {
        let from = (Utc::now() - ChronoDuration::days(LOOKBACK_DAYS))
            .format("%Y-%m-%d")
            .to_string();
        let url = format!("{}/everything", BASE_URL);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("from", from.as_str()),
                ("language", "en"),
                ("sortBy", "relevancy"),
                ("pageSize", &PAGE_SIZE.to_string()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnalysisError::ApiError(format!(
                "NewsAPI HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let body: EverythingResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidData(e.to_string()))?;

        if body.status != "ok" {
            return Err(AnalysisError::ApiError(format!(
                "NewsAPI status {}: {}",
                body.status,
                body.message.unwrap_or_default()
            )));
        }

        Ok(body.into_items(limit.min(MAX_ARTICLES)))
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    fn name(&self) -> &'static str {
        "NewsAPI"
    }

    async fn recent_news(
        &self,
        symbol: &str,
        company_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<NewsItem>, AnalysisError> {
        let query = company_name.filter(|n| !n.trim().is_empty()).unwrap_or(symbol);
        self.search(query, limit).await
    }
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    #[serde(default)]
    source: Option<ArticleSource>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

impl EverythingResponse {
    /// Articles without a title, a URL, or a parseable timestamp are skipped,
    /// as are the "[Removed]" placeholders NewsAPI returns for retracted items.
    fn into_items(self, limit: usize) -> Vec<NewsItem> {
        self.articles
            .into_iter()
            .filter_map(|a| {
                let title = a.title.filter(|t| !t.is_empty() && t != "[Removed]")?;
                let url = a.url?;
                let published_at = DateTime::parse_from_rfc3339(a.published_at.as_deref()?)
                    .ok()?
                    .with_timezone(&Utc);
                Some(NewsItem {
                    title,
                    publisher: a
                        .source
                        .and_then(|s| s.name)
                        .unwrap_or_else(|| "Unknown".to_string()),
                    url,
                    published_at: Some(published_at),
                    summary: truncate_summary(a.description.as_deref()),
                })
            })
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "status": "ok",
        "totalResults": 4,
        "articles": [
            {
                "source": {"id": null, "name": "Reuters"},
                "title": "Nvidia shares surge on record data center demand",
                "url": "https://example.com/a",
                "publishedAt": "2024-05-23T12:00:00Z",
                "description": "Revenue beat expectations."
            },
            {
                "source": {"id": null, "name": "[Removed]"},
                "title": "[Removed]",
                "url": "https://removed.com",
                "publishedAt": "2024-05-22T00:00:00Z"
            },
            {
                "source": {"id": null, "name": "Blog"},
                "title": "Undated piece",
                "url": "https://example.com/b",
                "publishedAt": "yesterday"
            },
            {
                "source": null,
                "title": "Chip stocks slip",
                "url": "https://example.com/c",
                "publishedAt": "2024-05-21T08:15:00Z",
                "description": ""
            }
        ]
    }"#;

    #[test]
    fn test_articles_mapping() {
        let body: EverythingResponse = serde_json::from_str(BODY).unwrap();
        let items = body.into_items(MAX_ARTICLES);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].publisher, "Reuters");
        assert_eq!(items[0].summary.as_deref(), Some("Revenue beat expectations."));
        assert_eq!(items[1].title, "Chip stocks slip");
        assert_eq!(items[1].publisher, "Unknown");
        assert_eq!(items[1].summary, None);
    }

    #[test]
    fn test_limit_applies_after_filtering() {
        let body: EverythingResponse = serde_json::from_str(BODY).unwrap();
        let items = body.into_items(1);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://example.com/a");
    }

    #[test]
    fn test_error_body_parses() {
        let body: EverythingResponse =
            serde_json::from_str(r#"{"status":"error","code":"apiKeyInvalid","message":"bad key"}"#).unwrap();
        assert_eq!(body.status, "error");
        assert!(body.articles.is_empty());
    }
}
