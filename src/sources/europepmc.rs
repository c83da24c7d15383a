//! Europe PMC REST client: publication search and full-text XML retrieval.

use std::borrow::Cow;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AnnotateError;

const EUROPEPMC_BASE: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest";
const EUROPEPMC_API: &str = "europepmc";
const EUROPEPMC_BASE_ENV: &str = "BIOTOOLS_ANNOTATE_EUROPEPMC_BASE";

#[derive(Clone)]
pub struct EuropePmcClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
}

impl EuropePmcClient {
    pub fn new(timeout_secs: u64) -> Result<Self, AnnotateError> {
        Ok(Self {
            client: crate::sources::retry_client(Duration::from_secs(timeout_secs), 3)?,
            base: crate::sources::env_base(EUROPEPMC_BASE, EUROPEPMC_BASE_ENV),
        })
    }

    /// Client pinned to an explicit base URL (mirrors, test servers).
    pub fn with_base(base: String, timeout_secs: u64) -> Result<Self, AnnotateError> {
        Ok(Self {
            client: crate::sources::retry_client(Duration::from_secs(timeout_secs), 0)?,
            base: Cow::Owned(base),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_ref().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Single-result core search for `<field>:<value>`.
    pub async fn search(
        &self,
        field: &str,
        value: &str,
    ) -> Result<EuropePmcSearchResponse, AnnotateError> {
        let url = self.endpoint("search");
        let query = format!("{field}:{value}");
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("query", query.as_str()),
                ("format", "json"),
                ("resulttype", "core"),
                ("pageSize", "1"),
            ])
            .send()
            .await?;

        let status = resp.status();
        let bytes = crate::sources::read_limited_body(resp, EUROPEPMC_API).await?;
        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(AnnotateError::Api {
                api: EUROPEPMC_API.to_string(),
                message: format!("HTTP {status}: {excerpt}"),
            });
        }
        serde_json::from_slice(&bytes).map_err(|err| AnnotateError::Api {
            api: EUROPEPMC_API.to_string(),
            message: format!("Invalid JSON response: {err}"),
        })
    }

    /// Fetch the full-text XML for a PMC article; `Ok(None)` when the body is
    /// empty.
    pub async fn full_text_xml(&self, pmcid: &str) -> Result<Option<String>, AnnotateError> {
        let url = self.endpoint(&format!("{pmcid}/fullTextXML"));
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        let bytes = crate::sources::read_limited_body(resp, EUROPEPMC_API).await?;
        if !status.is_success() {
            let excerpt = crate::sources::body_excerpt(&bytes);
            return Err(AnnotateError::Api {
                api: EUROPEPMC_API.to_string(),
                message: format!("HTTP {status}: {excerpt}"),
            });
        }
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok((!text.trim().is_empty()).then_some(text))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EuropePmcSearchResponse {
    pub hit_count: Option<u64>,
    pub result_list: Option<EuropePmcResultList>,
}

impl EuropePmcSearchResponse {
    pub fn into_first(self) -> Option<EuropePmcResult> {
        self.result_list.and_then(|l| l.result.into_iter().next())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EuropePmcResultList {
    #[serde(default)]
    pub result: Vec<EuropePmcResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EuropePmcResult {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub pmcid: Option<String>,
    pub pmid: Option<String>,
    pub doi: Option<String>,
    pub full_text_url_list: Option<FullTextUrlList>,
}

impl EuropePmcResult {
    pub fn full_text_urls(&self) -> Vec<String> {
        self.full_text_url_list
            .as_ref()
            .map(|list| {
                list.full_text_url
                    .iter()
                    .filter_map(|entry| entry.url.clone())
                    .filter(|url| !url.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullTextUrlList {
    #[serde(default)]
    pub full_text_url: Vec<FullTextUrl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullTextUrl {
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_builds_expected_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("query", "PMID:12345"))
            .and(query_param("format", "json"))
            .and(query_param("resulttype", "core"))
            .and(query_param("pageSize", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hitCount": 1,
                "resultList": {"result": [{
                    "title": "A tool paper",
                    "abstractText": "Background. Methods.",
                    "pmid": "12345",
                    "pmcid": "PMC777",
                    "fullTextUrlList": {"fullTextUrl": [{"url": "https://ftp.example/full"}]}
                }]}
            })))
            .mount(&server)
            .await;

        let client = EuropePmcClient::with_base(server.uri(), 5).unwrap();
        let resp = client.search("PMID", "12345").await.unwrap();
        assert_eq!(resp.hit_count, Some(1));
        let first = resp.into_first().unwrap();
        assert_eq!(first.pmcid.as_deref(), Some("PMC777"));
        assert_eq!(first.full_text_urls(), vec!["https://ftp.example/full"]);
    }

    #[tokio::test]
    async fn search_maps_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad query"))
            .mount(&server)
            .await;

        let client = EuropePmcClient::with_base(server.uri(), 5).unwrap();
        let err = client.search("PMID", "x").await.unwrap_err();
        assert!(err.to_string().contains("europepmc"));
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn full_text_returns_none_for_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/PMC777/fullTextXML"))
            .respond_with(ResponseTemplate::new(200).set_body_string("  "))
            .mount(&server)
            .await;

        let client = EuropePmcClient::with_base(server.uri(), 5).unwrap();
        assert!(client.full_text_xml("PMC777").await.unwrap().is_none());
    }
}
