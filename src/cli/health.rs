//! Connectivity checks for the external services the pipeline depends on.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::Config;
use crate::sources::ollama::OllamaClient;

#[derive(Debug, Clone, Serialize)]
pub struct HealthRow {
    pub api: String,
    pub status: String,
    pub latency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affects: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: usize,
    pub total: usize,
    pub rows: Vec<HealthRow>,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.healthy == self.total
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# biotools-annotate Health Check\n\n");
        out.push_str("| API | Status | Latency | Affects |\n");
        out.push_str("|-----|--------|---------|---------|\n");
        for row in &self.rows {
            let affects = row.affects.as_deref().unwrap_or("-");
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                row.api, row.status, row.latency, affects
            ));
        }
        out.push_str(&format!(
            "\nStatus: {}/{} APIs healthy\n",
            self.healthy, self.total
        ));
        out
    }
}

pub async fn check_all(config: &Config) -> HealthReport {
    let mut rows = Vec::new();
    rows.push(check_ollama(config).await);
    rows.push(check_europe_pmc(config).await);

    let healthy = rows.iter().filter(|row| row.status == "ok").count();
    HealthReport {
        healthy,
        total: rows.len(),
        rows,
    }
}

async fn check_ollama(config: &Config) -> HealthRow {
    let start = Instant::now();
    let outcome = match OllamaClient::new(config) {
        Ok(client) => client.ping().await,
        Err(err) => Err(err),
    };
    let elapsed = start.elapsed().as_millis();
    match outcome {
        Ok(()) => HealthRow {
            api: "Ollama".to_string(),
            status: "ok".to_string(),
            latency: format!("{elapsed}ms"),
            affects: None,
        },
        Err(err) => HealthRow {
            api: "Ollama".to_string(),
            status: "error".to_string(),
            latency: format!("{elapsed}ms ({err})"),
            affects: Some("LLM scoring (runs fall back to heuristics)".to_string()),
        },
    }
}

async fn check_europe_pmc(config: &Config) -> HealthRow {
    let start = Instant::now();
    let api = "Europe PMC".to_string();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.enrichment.europe_pmc.timeout))
        .build();
    let outcome = match client {
        Ok(client) => {
            let base = crate::sources::env_base(
                "https://www.ebi.ac.uk/europepmc/webservices/rest",
                "BIOTOOLS_ANNOTATE_EUROPEPMC_BASE",
            );
            client
                .get(format!("{}/search", base.trim_end_matches('/')))
                .query(&[("query", "SRC:MED"), ("format", "json"), ("pageSize", "1")])
                .send()
                .await
                .map_err(|err| err.to_string())
                .and_then(|resp| {
                    if resp.status().is_success() {
                        Ok(())
                    } else {
                        Err(format!("HTTP {}", resp.status().as_u16()))
                    }
                })
        }
        Err(err) => Err(err.to_string()),
    };
    let elapsed = start.elapsed().as_millis();
    match outcome {
        Ok(()) => HealthRow {
            api,
            status: "ok".to_string(),
            latency: format!("{elapsed}ms"),
            affects: None,
        },
        Err(reason) => HealthRow {
            api,
            status: "error".to_string(),
            latency: format!("{elapsed}ms ({reason})"),
            affects: Some("publication abstracts and full text".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_report_counts_health() {
        let report = HealthReport {
            healthy: 1,
            total: 2,
            rows: vec![
                HealthRow {
                    api: "Ollama".into(),
                    status: "ok".into(),
                    latency: "3ms".into(),
                    affects: None,
                },
                HealthRow {
                    api: "Europe PMC".into(),
                    status: "error".into(),
                    latency: "10ms (HTTP 503)".into(),
                    affects: Some("publication abstracts and full text".into()),
                },
            ],
        };
        assert!(!report.all_healthy());
        let markdown = report.to_markdown();
        assert!(markdown.contains("| Ollama | ok |"));
        assert!(markdown.contains("Status: 1/2 APIs healthy"));
    }
}
