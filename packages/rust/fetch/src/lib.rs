//! Website fetch capability.
//!
//! Downloads a single page and reduces it to a [`SiteSnapshot`]: title,
//! meta description, `h1`..`h3` headings and a whitespace-collapsed sample
//! of the visible body text (scripts and styles removed).

use std::net::IpAddr;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use blogsmith_shared::{BlogsmithError, ErrorKind, FetchConfig, Fetcher, Result, SiteSnapshot};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub user_agent: String,
    /// Body text is truncated to this many characters.
    pub max_text_chars: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for FetchOptions {
    fn from(config: &FetchConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            user_agent: config.user_agent.clone(),
            max_text_chars: config.max_text_chars,
        }
    }
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// `reqwest` + `scraper` implementation of [`Fetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_text_chars: usize,
    allow_private_hosts: bool,
}

impl HttpFetcher {
    pub fn new(opts: FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(opts.user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(opts.timeout)
            .build()
            .map_err(|e| BlogsmithError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_text_chars: opts.max_text_chars,
            allow_private_hosts: false,
        })
    }

    /// Permit loopback and private-network targets (tests, local previews).
    pub fn allow_private_hosts(mut self) -> Self {
        self.allow_private_hosts = true;
        self
    }

    fn check_target(&self, url: &Url) -> Result<()> {
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(BlogsmithError::Fetch(format!(
                    "{url}: unsupported scheme `{other}`"
                )));
            }
        }
        if !self.allow_private_hosts && is_private_target(url) {
            return Err(BlogsmithError::Fetch(format!(
                "{url}: refusing to fetch a private or loopback address"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<SiteSnapshot> {
        let parsed =
            Url::parse(url).map_err(|e| BlogsmithError::Fetch(format!("{url}: invalid URL: {e}")))?;
        self.check_target(&parsed)?;

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| BlogsmithError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BlogsmithError::http_status(
                ErrorKind::Fetch,
                status.as_u16(),
                format!("{url}: HTTP {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BlogsmithError::Fetch(format!("{url}: body read failed: {e}")))?;

        let snapshot = parse_snapshot(url, &body, self.max_text_chars);
        debug!(
            title = %snapshot.title,
            headings = snapshot.headings.len(),
            text_chars = snapshot.text.chars().count(),
            "page fetched"
        );
        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// HTML reduction
// ---------------------------------------------------------------------------

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static DESCRIPTION_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).expect("valid selector"));
static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3").expect("valid selector"));
static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

/// Reduce an HTML document to a [`SiteSnapshot`].
pub fn parse_snapshot(url: &str, html: &str, max_text_chars: usize) -> SiteSnapshot {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&TITLE_SEL)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default();

    let description = doc
        .select(&DESCRIPTION_SEL)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .unwrap_or_default();

    let headings = doc
        .select(&HEADING_SEL)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|h| !h.is_empty())
        .collect();

    let text: String = visible_text(&doc).chars().take(max_text_chars).collect();

    SiteSnapshot {
        url: url.to_string(),
        title,
        description,
        headings,
        text: text.trim_end().to_string(),
    }
}

/// Body text outside `script`, `style` and `noscript` elements.
fn visible_text(doc: &Html) -> String {
    let root = doc
        .select(&BODY_SEL)
        .next()
        .unwrap_or_else(|| doc.root_element());

    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript"))
        });
        if !hidden {
            parts.push(&**text);
        }
    }

    collapse_whitespace(&parts.join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

fn is_private_target(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return true;
    };
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return is_private_ip(&ip);
    }
    host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <title>  Leaf &amp; Kettle | Fine Teas </title>
  <meta name="description" content="Small-batch loose leaf tea, shipped fresh.">
  <style>body { color: red; }</style>
</head>
<body>
  <nav>Home Shop</nav>
  <h1>Fine loose leaf tea</h1>
  <p>We source   directly
     from growers.</p>
  <script>var tracking = "do not include";</script>
  <h2>Green teas</h2>
  <h3>Brewing guide</h3>
  <h4>Ignored depth</h4>
</body>
</html>"#;

    #[test]
    fn snapshot_extracts_fields() {
        let snap = parse_snapshot("https://leaf.example", PAGE, 2000);
        assert_eq!(snap.url, "https://leaf.example");
        assert_eq!(snap.title, "Leaf & Kettle | Fine Teas");
        assert_eq!(snap.description, "Small-batch loose leaf tea, shipped fresh.");
        assert_eq!(
            snap.headings,
            vec!["Fine loose leaf tea", "Green teas", "Brewing guide"]
        );
        assert!(snap.text.contains("We source directly from growers."));
        assert!(!snap.text.contains("tracking"));
        assert!(!snap.text.contains("color: red"));
    }

    #[test]
    fn snapshot_text_truncated() {
        let snap = parse_snapshot("https://leaf.example", PAGE, 10);
        assert!(snap.text.chars().count() <= 10);
    }

    #[test]
    fn private_targets_detected() {
        for url in [
            "http://localhost:8080/",
            "http://127.0.0.1/",
            "http://10.0.0.5/",
            "http://[::1]/",
            "http://printer.local/",
        ] {
            assert!(is_private_target(&Url::parse(url).unwrap()), "{url}");
        }
        assert!(!is_private_target(&Url::parse("https://example.com").unwrap()));
    }

    #[tokio::test]
    async fn fetch_with_mock_server() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string(PAGE)
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(FetchOptions::default())
            .unwrap()
            .allow_private_hosts();
        let url = format!("{}/", server.uri());
        let snap = fetcher.fetch(&url).await.unwrap();

        assert_eq!(snap.title, "Leaf & Kettle | Fine Teas");
        assert_eq!(snap.headings.len(), 3);
    }

    #[tokio::test]
    async fn fetch_non_success_is_fetch_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(FetchOptions::default())
            .unwrap()
            .allow_private_hosts();
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();

        assert!(matches!(err, BlogsmithError::Fetch(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn fetch_not_found_is_not_retried() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(FetchOptions::default())
            .unwrap()
            .allow_private_hosts();
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert!(!err.is_transient());
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn fetch_refuses_loopback_by_default() {
        let fetcher = HttpFetcher::new(FetchOptions::default()).unwrap();
        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(err.to_string().contains("private or loopback"));

        let err = fetcher.fetch("ftp://example.com/file").await.unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }
}
