//! Homepage scraping: fetch a candidate's homepage (and its frames, within a
//! bounded budget), mine documentation links, keywords and a repository URL,
//! and record homepage telemetry on the candidate.
//!
//! Failures never propagate; every outcome lands in `homepage_status` /
//! `homepage_error` / `homepage_scraped` on the candidate itself.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

use crate::config::HomepageConfig;
use crate::entities::candidate::{Candidate, HomepageStatus};
use crate::error::AnnotateError;
use crate::utils::text::{normalize_whitespace, truncate_error};

/// Anchor keywords mined into `documentation_keywords`, grouped by the five
/// documentation rubric areas.
pub const DOCUMENTATION_KEYWORDS: &[&str] = &[
    // Documentation completeness
    "doc",
    "docs",
    "documentation",
    "manual",
    "user manual",
    "handbook",
    "guide",
    "usage guide",
    "usage",
    "how to",
    "how-to",
    "tutorial",
    "walkthrough",
    "quickstart",
    "getting started",
    "examples",
    "example",
    "sample",
    "cookbook",
    "reference",
    "api reference",
    "start here",
    "first steps",
    "example workflow",
    "usage:",
    "--help",
    "cli",
    "gui",
    "web app",
    "rest api",
    "openapi",
    "swagger",
    "galaxy",
    "shiny",
    "streamlit",
    "gradio",
    // Installation pathways
    "install",
    "installation",
    "setup",
    "set up",
    "pip install",
    "pip3 install",
    "conda install",
    "mamba install",
    "bioconda",
    "bioconductor",
    "cran",
    "brew install",
    "apt-get install",
    "docker",
    "dockerfile",
    "docker pull",
    "container",
    "singularity",
    "singularity recipe",
    "apptainer",
    "podman",
    "biocontainers",
    "ghcr.io",
    "quay.io",
    "requirements.txt",
    "environment.yml",
    "env.yaml",
    "poetry.lock",
    "pipfile",
    "build",
    "compile",
    "binary",
    "package",
    // Reproducibility aids
    "release",
    "release date",
    "latest release",
    "releases",
    "changelog",
    "version",
    "version history",
    "tag",
    "git tag",
    "tags",
    "doi",
    "zenodo",
    "license",
    "mit",
    "gpl",
    "apache",
    "bsd",
    "archival",
    "workflow",
    "pipeline",
    "makefile",
    "test data",
    "sample dataset",
    "exact command",
    "reproduce",
    "replicate",
    "benchmark",
    // Maintenance signal
    "updated",
    "last updated",
    "commit",
    "recent commit",
    "activity",
    "roadmap",
    "issue tracker",
    "issues",
    "open issues",
    "closed issues",
    "news",
    "blog",
    "maintained",
    "supported",
    "support",
    "active",
    // Onboarding & support
    "help",
    "faq",
    "troubleshooting",
    "contact",
    "email",
    "support@",
    "community",
    "forum",
    "contributing",
    "contribution guide",
    "code of conduct",
];

pub const REPOSITORY_HOSTS: &[&str] = &[
    "github.com",
    "gitlab.com",
    "bitbucket.org",
    "codeberg.org",
    "gitee.com",
    "sourceforge.net",
    "git.sr.ht",
    "launchpad.net",
];

const PUBLICATION_HOST_KEYWORDS: &[&str] = &[
    "doi.org",
    "dx.doi.org",
    "pubmed.ncbi.nlm.nih.gov",
    "ncbi.nlm.nih.gov",
    "europepmc.org",
    "link.springer.com",
    "nature.com",
    "sciencedirect.com",
    "academic.oup.com",
    "onlinelibrary.wiley.com",
    "biomedcentral.com",
    "journals.plos.org",
    "frontiersin.org",
    "researchgate.net",
    "biorxiv.org",
    "medrxiv.org",
    "ieeexplore.ieee.org",
    "dl.acm.org",
    "jamanetwork.com",
    "science.org",
    "cell.com",
    "hindawi.com",
    "tandfonline.com",
    "karger.com",
    "spiedigitallibrary.org",
    "iop.org",
];

const LAYOUT_PARENT_NAMES: &[&str] = &["nav", "header", "footer", "aside"];

const LAYOUT_ATTR_KEYWORDS: &[&str] = &[
    "header",
    "footer",
    "nav",
    "menu",
    "breadcrumb",
    "sidebar",
    "toolbar",
    "subnav",
    "pagehead",
    "repository-content-header",
    "gh-header",
    "site-footer",
    "site-header",
];

const REPO_NAV_PATH_PREFIXES: &[&str] = &[
    "/issues",
    "/pulls",
    "/pull",
    "/actions",
    "/projects",
    "/security",
    "/discussions",
    "/packages",
    "/marketplace",
    "/sponsors",
    "/network",
    "/graphs",
    "/pulse",
];

const REPO_NAV_TEXT: &[&str] = &[
    "issues",
    "pull requests",
    "pull request",
    "actions",
    "security",
    "projects",
    "insights",
    "code",
    "sponsors",
    "packages",
    "discussions",
    "marketplace",
    "network",
    "graphs",
    "pulse",
];

// Homepage failure labels (closed set; also serialized into reports).
pub const LABEL_CONNECTION_ERROR: &str = "connection_error";
pub const LABEL_TIMEOUT: &str = "timeout";
pub const LABEL_REDIRECT_ERROR: &str = "redirect_error";
pub const LABEL_INVALID_URL: &str = "invalid_url";
pub const LABEL_SSL_ERROR: &str = "ssl_error";
pub const LABEL_REQUEST_ERROR: &str = "request_error";
pub const LABEL_NON_HTML_CONTENT: &str = "non_html_content";
pub const LABEL_CONTENT_TOO_LARGE: &str = "content_too_large";
pub const LABEL_FILTERED_PUBLICATION_URL: &str = "filtered_publication_url";

static DOI_PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/10\.\d{4,9}/").expect("static regex"));

/// A URL pointing at a publication record rather than a tool homepage:
/// known publishing host, DOI path segment, or an NIH PMC archive.
pub fn is_probable_publication_url(url: &str) -> bool {
    let candidate = url.trim();
    if candidate.is_empty() {
        return false;
    }
    let Ok(parsed) = Url::parse(candidate) else {
        return false;
    };
    let Some(host) = parsed.host_str().map(str::to_lowercase) else {
        return false;
    };
    let path = parsed.path().to_lowercase();
    if PUBLICATION_HOST_KEYWORDS
        .iter()
        .any(|keyword| host.contains(keyword))
    {
        return true;
    }
    if host.ends_with(".nih.gov") && (host.contains("pmc") || path.contains("/pmc")) {
        return true;
    }
    DOI_PATH_PATTERN.is_match(&path)
}

/// Frame crawl budget shared across the whole frame tree.
#[derive(Debug)]
pub struct FrameLimiter {
    max_frames: usize,
    max_depth: usize,
    fetches: usize,
}

impl FrameLimiter {
    pub fn new(max_frames: usize, max_depth: usize) -> Self {
        Self {
            max_frames,
            max_depth,
            fetches: 0,
        }
    }

    pub fn can_fetch_more(&self) -> bool {
        self.max_frames > 0 && self.fetches < self.max_frames
    }

    pub fn depth_allowed(&self, depth: usize) -> bool {
        self.max_depth > 0 && depth < self.max_depth
    }

    pub fn record_fetch(&mut self) {
        self.fetches += 1;
    }
}

/// Links and keywords mined from one page.
#[derive(Debug, Default, Clone)]
pub struct PageMeta {
    pub documentation: Vec<String>,
    pub keywords: BTreeSet<String>,
    pub repository: Option<String>,
}

impl PageMeta {
    pub fn is_empty(&self) -> bool {
        self.documentation.is_empty() && self.keywords.is_empty() && self.repository.is_none()
    }

    /// Union another page's results into this one: unseen documentation URLs
    /// append in order, keywords union, first non-empty repository wins.
    pub fn merge(&mut self, other: PageMeta) {
        let seen: HashSet<&String> = self.documentation.iter().collect();
        let fresh: Vec<String> = other
            .documentation
            .into_iter()
            .filter(|url| !seen.contains(url))
            .collect();
        self.documentation.extend(fresh);
        self.keywords.extend(other.keywords);
        if self.repository.is_none() {
            self.repository = other.repository;
        }
    }
}

enum FetchFailure {
    Transport { label: &'static str, message: String },
    Http(u16),
    NonHtml(String),
    TooLarge(String),
}

pub struct HomepageScraper {
    client: reqwest::Client,
    config: HomepageConfig,
}

impl HomepageScraper {
    pub fn new(config: HomepageConfig) -> Result<Self, AnnotateError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(AnnotateError::from)?;
        Ok(Self { client, config })
    }

    /// Fetch the candidate's homepage and enrich it in place. Never fails;
    /// the outcome is recorded on the candidate.
    pub async fn scrape(&self, candidate: &mut Candidate) {
        let homepage_candidates = candidate.homepage_candidates();
        let Some(first) = homepage_candidates.first() else {
            return;
        };

        let homepage = if is_probable_publication_url(first) {
            match homepage_candidates
                .iter()
                .find(|url| !is_probable_publication_url(url))
            {
                Some(alternative) => alternative.clone(),
                None => {
                    candidate.homepage = None;
                    candidate.homepage_status = None;
                    candidate.homepage_filtered_url = None;
                    candidate.homepage_error =
                        Some(LABEL_FILTERED_PUBLICATION_URL.to_string());
                    candidate.homepage_scraped = Some(false);
                    return;
                }
            }
        } else {
            first.clone()
        };

        if candidate.homepage.as_deref() != Some(homepage.as_str()) {
            candidate.homepage = Some(homepage.clone());
        }

        let (status, html) = match self.fetch_html(&homepage).await {
            Ok(ok) => ok,
            Err(failure) => {
                self.record_failure(candidate, &homepage, failure);
                return;
            }
        };

        candidate.homepage_status = Some(HomepageStatus::Code(status));
        candidate.homepage_error = None;

        let mut meta = extract_metadata(&html, &homepage);
        let frame_meta = self.crawl_frames(&html, &homepage).await;
        meta.merge(frame_meta);

        if !meta.documentation.is_empty() {
            candidate.merge_documentation(meta.documentation);
        }
        if candidate.repository.is_none() {
            candidate.repository = meta.repository;
        }
        candidate.documentation_keywords = meta.keywords.into_iter().collect();
        candidate.homepage_scraped = Some(true);
    }

    fn record_failure(&self, candidate: &mut Candidate, homepage: &str, failure: FetchFailure) {
        match failure {
            FetchFailure::Transport { label, message } => {
                warn!(url = homepage, label, "SCRAPE failed");
                candidate.homepage_status = Some(HomepageStatus::Label(label.to_string()));
                let message = truncate_error(&message, 140);
                candidate.homepage_error = Some(if message.is_empty() {
                    label.to_string()
                } else {
                    message
                });
            }
            FetchFailure::Http(code) => {
                candidate.homepage_status = Some(HomepageStatus::Code(code));
                candidate.homepage_error = Some(format!("HTTP {code}"));
            }
            FetchFailure::NonHtml(message) => {
                warn!(url = homepage, message = %message, "SCRAPE skipped");
                candidate.homepage_status =
                    Some(HomepageStatus::Label(LABEL_NON_HTML_CONTENT.to_string()));
                candidate.homepage_error = Some(truncate_error(&message, 140));
            }
            FetchFailure::TooLarge(message) => {
                warn!(url = homepage, message = %message, "SCRAPE skipped");
                candidate.homepage_status =
                    Some(HomepageStatus::Label(LABEL_CONTENT_TOO_LARGE.to_string()));
                candidate.homepage_error = Some(truncate_error(&message, 140));
            }
        }
        candidate.homepage_scraped = Some(false);
    }

    /// BFS over `<frame>`/`<iframe>` sources, bounded by the configured fetch
    /// and depth budget. Frame failures are logged and skipped.
    async fn crawl_frames(&self, root_html: &str, root_url: &str) -> PageMeta {
        let mut limiter = FrameLimiter::new(self.config.max_frames, self.config.max_frame_depth);
        let mut aggregated = PageMeta::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, String, usize)> = VecDeque::new();
        queue.push_back((root_html.to_string(), root_url.to_string(), 0));

        'outer: while let Some((html, base_url, depth)) = queue.pop_front() {
            if !limiter.depth_allowed(depth) {
                continue;
            }
            for frame_url in discover_frame_urls(&html, &base_url) {
                if !visited.insert(frame_url.clone()) {
                    continue;
                }
                if !limiter.can_fetch_more() {
                    break 'outer;
                }
                let outcome = self.fetch_html(&frame_url).await;
                if !matches!(outcome, Err(FetchFailure::Transport { .. })) {
                    limiter.record_fetch();
                }
                match outcome {
                    Ok((_, frame_html)) => {
                        aggregated.merge(extract_metadata(&frame_html, &frame_url));
                        if limiter.depth_allowed(depth + 1) {
                            queue.push_back((frame_html, frame_url, depth + 1));
                        }
                    }
                    Err(FetchFailure::Http(code)) => {
                        warn!(url = %frame_url, code, "SCRAPE frame failed");
                    }
                    Err(FetchFailure::Transport { message, .. })
                    | Err(FetchFailure::NonHtml(message))
                    | Err(FetchFailure::TooLarge(message)) => {
                        warn!(url = %frame_url, message = %message, "SCRAPE frame skipped");
                    }
                }
            }
        }

        aggregated
    }

    /// Single GET with the configured timeout; the body is streamed and never
    /// buffered past `max_bytes`.
    async fn fetch_html(&self, url: &str) -> Result<(u16, String), FetchFailure> {
        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_secs(self.config.timeout))
            .send()
            .await
            .map_err(|err| {
                let (label, message) = classify_fetch_error(&err);
                FetchFailure::Transport { label, message }
            })?;

        let status = resp.status().as_u16();
        if status >= 400 {
            return Err(FetchFailure::Http(status));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !content_type.is_empty()
            && !content_type.contains("html")
            && !content_type.contains("text")
        {
            return Err(FetchFailure::NonHtml(format!(
                "unsupported content-type: {content_type}"
            )));
        }

        let max_bytes = self.config.max_bytes;
        if let Some(declared) = resp.content_length()
            && declared as usize > max_bytes
        {
            return Err(FetchFailure::TooLarge(format!(
                "declared content length {declared} bytes exceeds limit {max_bytes}"
            )));
        }

        let mut resp = resp;
        let mut body: Vec<u8> = Vec::new();
        loop {
            match resp.chunk().await {
                Ok(Some(chunk)) => {
                    body.extend_from_slice(&chunk);
                    if body.len() > max_bytes {
                        return Err(FetchFailure::TooLarge(format!(
                            "downloaded content length exceeds limit {max_bytes}"
                        )));
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    let (label, message) = classify_fetch_error(&err);
                    return Err(FetchFailure::Transport { label, message });
                }
            }
        }

        Ok((status, String::from_utf8_lossy(&body).into_owned()))
    }
}

fn classify_fetch_error(err: &reqwest::Error) -> (&'static str, String) {
    if err.is_timeout() {
        return (LABEL_TIMEOUT, "request timed out".to_string());
    }
    if err.is_redirect() {
        return (LABEL_REDIRECT_ERROR, "too many redirects".to_string());
    }
    if err.is_builder() {
        return (LABEL_INVALID_URL, err.to_string());
    }
    let chain = error_chain(err).to_lowercase();
    if chain.contains("certificate") || chain.contains("ssl") || chain.contains("tls") {
        return (LABEL_SSL_ERROR, err.to_string());
    }
    if err.is_connect() {
        return (LABEL_CONNECTION_ERROR, err.to_string());
    }
    (LABEL_REQUEST_ERROR, err.to_string())
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

/// Walk every `a[href]` anchor of the page and collect documentation links,
/// matched keywords and a repository URL.
pub fn extract_metadata(html: &str, base_url: &str) -> PageMeta {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return PageMeta::default();
    };
    let base = Url::parse(base_url).ok();

    let mut meta = PageMeta::default();
    let mut seen_docs: HashSet<String> = HashSet::new();

    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }

        let text = anchor_text(&anchor);
        let text_lower = text.to_lowercase();
        let href_lower = href.to_lowercase();
        let resolved = resolve_href(base.as_ref(), href);
        let resolved_host = Url::parse(&resolved)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
            .unwrap_or_default();

        if meta.repository.is_none() && REPOSITORY_HOSTS.contains(&resolved_host.as_str()) {
            meta.repository = Some(resolved.clone());
        }

        let matching = matching_keywords(&text_lower, &href_lower);

        if is_repo_navigation_link(&resolved, &text) {
            continue;
        }
        if matching.is_empty() && has_layout_ancestor(&anchor, 4) {
            continue;
        }

        if !matching.is_empty() && seen_docs.insert(resolved.clone()) {
            meta.documentation.push(resolved);
        }
        meta.keywords
            .extend(matching.into_iter().map(|k| k.to_lowercase()));
    }

    meta
}

/// Resolve `<frame>`/`<iframe>` source URLs against the page base.
pub fn discover_frame_urls(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("frame[src], iframe[src]") else {
        return Vec::new();
    };
    let base = Url::parse(base_url).ok();

    document
        .select(&selector)
        .filter_map(|tag| tag.value().attr("src"))
        .filter(|src| !src.is_empty())
        .map(|src| resolve_href(base.as_ref(), src))
        .collect()
}

/// Keywords present as substrings of the anchor text or its raw href.
pub fn matching_keywords(text_lower: &str, href_lower: &str) -> Vec<&'static str> {
    DOCUMENTATION_KEYWORDS
        .iter()
        .copied()
        .filter(|keyword| text_lower.contains(keyword) || href_lower.contains(keyword))
        .collect()
}

fn resolve_href(base: Option<&Url>, href: &str) -> String {
    match base {
        Some(base) => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        None => href.to_string(),
    }
}

fn anchor_text(anchor: &ElementRef) -> String {
    let joined = anchor.text().collect::<Vec<_>>().join(" ");
    normalize_whitespace(&joined)
}

/// Repository chrome (Issues / Pull requests / Actions tabs and the like)
/// carries documentation-ish words but no documentation.
fn is_repo_navigation_link(resolved_url: &str, anchor_text: &str) -> bool {
    let Ok(parsed) = Url::parse(resolved_url) else {
        return false;
    };
    let Some(host) = parsed.host_str().map(str::to_lowercase) else {
        return false;
    };
    if !REPOSITORY_HOSTS.contains(&host.as_str()) {
        return false;
    }
    let text = anchor_text.trim().to_lowercase();
    if REPO_NAV_TEXT.contains(&text.as_str()) {
        return true;
    }
    let path = parsed.path().to_lowercase();
    REPO_NAV_PATH_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")))
}

fn has_layout_ancestor(anchor: &ElementRef, max_depth: usize) -> bool {
    let mut depth = 0;
    let mut node = anchor.parent();
    while let Some(current) = node {
        if let Some(element) = ElementRef::wrap(current) {
            if is_layout_container(&element) {
                return true;
            }
            depth += 1;
            if depth >= max_depth {
                break;
            }
        }
        node = current.parent();
    }
    false
}

fn is_layout_container(element: &ElementRef) -> bool {
    let name = element.value().name().to_lowercase();
    if LAYOUT_PARENT_NAMES.contains(&name.as_str()) {
        return true;
    }
    for attr in ["class", "id", "role", "aria-label", "data-testid"] {
        let Some(value) = element.value().attr(attr) else {
            continue;
        };
        for token in value.split_whitespace() {
            let token = token.to_lowercase();
            if LAYOUT_ATTR_KEYWORDS
                .iter()
                .any(|keyword| token.contains(keyword))
            {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scraper_with(config: HomepageConfig) -> HomepageScraper {
        HomepageScraper::new(config).unwrap()
    }

    fn default_scraper() -> HomepageScraper {
        scraper_with(HomepageConfig::default())
    }

    fn candidate_with_urls(urls: Vec<&str>) -> Candidate {
        serde_json::from_value(json!({"title": "Tool", "urls": urls})).unwrap()
    }

    #[test]
    fn publication_urls_are_detected() {
        assert!(is_probable_publication_url("https://doi.org/10.1000/x"));
        assert!(is_probable_publication_url(
            "https://journal.example/article/10.1234/abcd"
        ));
        assert!(is_probable_publication_url(
            "https://pubmed.ncbi.nlm.nih.gov/12345/"
        ));
        assert!(is_probable_publication_url(
            "https://pmc.carchive.nih.gov/articles/PMC1"
        ));
        assert!(!is_probable_publication_url("https://tool.example"));
        assert!(!is_probable_publication_url(""));
        assert!(!is_probable_publication_url("not a url"));
    }

    #[test]
    fn frame_limiter_enforces_budgets() {
        let mut limiter = FrameLimiter::new(2, 1);
        assert!(limiter.can_fetch_more());
        assert!(limiter.depth_allowed(0));
        assert!(!limiter.depth_allowed(1));
        limiter.record_fetch();
        limiter.record_fetch();
        assert!(!limiter.can_fetch_more());

        let zero = FrameLimiter::new(0, 0);
        assert!(!zero.can_fetch_more());
        assert!(!zero.depth_allowed(0));
    }

    #[test]
    fn extract_metadata_finds_docs_repo_and_keywords() {
        let html = r##"<html><body>
            <a href="/docs">Documentation</a>
            <a href="https://github.com/org/tool">Source code</a>
            <a href="#">skip me</a>
            <a href="/about">About</a>
        </body></html>"##;
        let meta = extract_metadata(html, "https://tool.example/");
        assert_eq!(meta.documentation, vec!["https://tool.example/docs"]);
        assert_eq!(meta.repository.as_deref(), Some("https://github.com/org/tool"));
        assert!(meta.keywords.contains("doc"));
        assert!(meta.keywords.contains("documentation"));
    }

    #[test]
    fn repo_navigation_links_are_suppressed() {
        let html = r#"<html><body>
            <a href="https://github.com/org/tool/issues">Issues</a>
            <a href="https://github.com/org/tool/pulls">Pull requests</a>
            <a href="https://github.com/org/tool/wiki">User guide</a>
        </body></html>"#;
        let meta = extract_metadata(html, "https://github.com/org/tool");
        assert_eq!(
            meta.documentation,
            vec!["https://github.com/org/tool/wiki"]
        );
        // The repository itself is still recorded from the first anchor.
        assert_eq!(
            meta.repository.as_deref(),
            Some("https://github.com/org/tool/issues")
        );
    }

    #[test]
    fn layout_anchors_without_keywords_are_skipped() {
        let html = r#"<html><body>
            <nav><a href="/pricing">Pricing</a></nav>
            <div class="site-footer"><a href="/imprint">Imprint</a></div>
            <nav><a href="/manual">Manual</a></nav>
            <main><a href="/team">Team</a></main>
        </body></html>"#;
        let meta = extract_metadata(html, "https://tool.example/");
        // Keyword-bearing anchors survive layout containers; the rest do not.
        assert_eq!(meta.documentation, vec!["https://tool.example/manual"]);
        assert!(meta.keywords.contains("manual"));
    }

    #[tokio::test]
    async fn publication_primary_url_falls_back_to_alternate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><a href=\"/docs\">Docs</a></body></html>",
            ))
            .mount(&server)
            .await;

        let mut candidate = candidate_with_urls(vec!["https://doi.org/10.1000/x"]);
        candidate.urls.push(format!("{}/", server.uri()));
        default_scraper().scrape(&mut candidate).await;

        assert_eq!(candidate.homepage.as_deref(), Some(format!("{}/", server.uri()).as_str()));
        assert_eq!(candidate.homepage_scraped, Some(true));
        assert_eq!(candidate.homepage_status, Some(HomepageStatus::Code(200)));
        assert_eq!(candidate.documentation.len(), 1);
    }

    #[tokio::test]
    async fn publication_url_without_alternate_is_filtered() {
        let mut candidate = candidate_with_urls(vec!["https://doi.org/10.1000/x"]);
        default_scraper().scrape(&mut candidate).await;

        assert!(candidate.homepage.is_none());
        assert!(candidate.homepage_status.is_none());
        assert_eq!(
            candidate.homepage_error.as_deref(),
            Some("filtered_publication_url")
        );
        assert_eq!(candidate.homepage_scraped, Some(false));
    }

    #[tokio::test]
    async fn http_error_is_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut candidate = candidate_with_urls(vec![]);
        candidate.urls.push(format!("{}/", server.uri()));
        default_scraper().scrape(&mut candidate).await;

        assert_eq!(candidate.homepage_status, Some(HomepageStatus::Code(404)));
        assert_eq!(candidate.homepage_error.as_deref(), Some("HTTP 404"));
        assert_eq!(candidate.homepage_scraped, Some(false));
    }

    #[tokio::test]
    async fn non_html_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .set_body_bytes(vec![0u8; 16]),
            )
            .mount(&server)
            .await;

        let mut candidate = candidate_with_urls(vec![]);
        candidate.urls.push(format!("{}/", server.uri()));
        default_scraper().scrape(&mut candidate).await;

        assert_eq!(
            candidate.homepage_status,
            Some(HomepageStatus::Label("non_html_content".to_string()))
        );
        assert_eq!(candidate.homepage_scraped, Some(false));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_by_declared_length() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html>".repeat(200)),
            )
            .mount(&server)
            .await;

        let mut config = HomepageConfig::default();
        config.max_bytes = 64;
        let mut candidate = candidate_with_urls(vec![]);
        candidate.urls.push(format!("{}/", server.uri()));
        scraper_with(config).scrape(&mut candidate).await;

        assert_eq!(
            candidate.homepage_status,
            Some(HomepageStatus::Label("content_too_large".to_string()))
        );
        assert_eq!(candidate.homepage_scraped, Some(false));
    }

    #[tokio::test]
    async fn connection_error_maps_to_label() {
        // Port 9 on localhost should refuse connections.
        let mut candidate = candidate_with_urls(vec!["http://127.0.0.1:9/"]);
        let mut config = HomepageConfig::default();
        config.timeout = 2;
        scraper_with(config).scrape(&mut candidate).await;

        match &candidate.homepage_status {
            Some(HomepageStatus::Label(label)) => {
                assert!(label == "connection_error" || label == "timeout");
            }
            other => panic!("expected failure label, got {other:?}"),
        }
        assert_eq!(candidate.homepage_scraped, Some(false));
    }

    #[tokio::test]
    async fn frame_budget_bounds_fetches() {
        let server = MockServer::start().await;
        let frame_page = "<html><body><a href=\"/install\">Install</a></body></html>";
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body>\
                 <iframe src=\"/frame1\"></iframe>\
                 <iframe src=\"/frame2\"></iframe>\
                 </body></html>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/frame1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(frame_page))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/frame2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(frame_page))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = HomepageConfig::default();
        config.max_frames = 1;
        let mut candidate = candidate_with_urls(vec![]);
        candidate.urls.push(format!("{}/", server.uri()));
        scraper_with(config).scrape(&mut candidate).await;

        assert_eq!(candidate.homepage_scraped, Some(true));
        assert_eq!(
            candidate.documentation.first().map(|d| d.url.as_str()),
            Some(format!("{}/install", server.uri()).as_str())
        );
        assert!(candidate
            .documentation_keywords
            .iter()
            .any(|k| k == "install"));
    }
}
