use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::config::AcquisitionConfig;

// ── Constants ────────────────────────────────────────────────────────────────

const USER_AGENT: &str = "vehicle-evaluator/0.1";
const URL_PLACEHOLDER: &str = "{url}";
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

static HTML_DOCUMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(?:!doctype\s+html|html[\s>]|body[\s>])").unwrap());

static MULTI_NEWLINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static TITLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static BODY_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

// ── Strategy list ────────────────────────────────────────────────────────────

/// A relay that fetches an arbitrary page on our behalf. The template carries
/// a `{url}` placeholder for the percent-encoded target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    template: String,
}

impl ProxyEndpoint {
    pub fn new(template: impl Into<String>) -> Result<Self, String> {
        let template = template.into();
        if !template.contains(URL_PLACEHOLDER) {
            return Err(format!("proxy template {template:?} has no {URL_PLACEHOLDER} placeholder"));
        }
        Ok(Self { template })
    }

    pub fn request_url(&self, target: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
        self.template.replace(URL_PLACEHOLDER, &encoded)
    }

    /// Host of the relay, for logging.
    pub fn host(&self) -> &str {
        let rest = self
            .template
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.template);
        rest.split(['/', '?']).next().unwrap_or(rest)
    }
}

/// Decides whether a relay response is usable listing content.
#[derive(Debug, Clone)]
pub struct AcceptancePolicy {
    pub timeout: Duration,
    pub min_body_chars: usize,
    pub denial_markers: Vec<String>,
}

impl AcceptancePolicy {
    pub fn rejection(&self, body: &str) -> Option<Rejection> {
        if body.chars().count() <= self.min_body_chars {
            return Some(Rejection::TooShort);
        }
        if self.denial_markers.iter().any(|m| body.contains(m.as_str())) {
            return Some(Rejection::Denied);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooShort,
    Denied,
}

// ── Outcome ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    Fetched { content: String },
    NeedsManualPaste,
}

// ── Acquirer ─────────────────────────────────────────────────────────────────

pub struct Acquirer {
    client: reqwest::Client,
    proxies: Vec<ProxyEndpoint>,
    policy: AcceptancePolicy,
    condense_min_chars: Option<usize>,
}

impl Acquirer {
    /// `condense_min_chars` enables HTML condensation; the condensed text is
    /// used only when it is at least that long.
    pub fn new(
        config: &AcquisitionConfig,
        condense_min_chars: usize,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let mut builder = reqwest::ClientBuilder::new()
            .connect_timeout(config.policy.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(USER_AGENT)
            .default_headers(headers);

        if config.insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
            proxies: config.proxies.clone(),
            policy: config.policy.clone(),
            condense_min_chars: config.condense_html.then_some(condense_min_chars),
        })
    }

    /// Walk the proxy list in order and return the first acceptable body.
    pub async fn fetch_listing(&self, url: &str) -> Acquisition {
        for proxy in &self.proxies {
            let Some(body) = self.try_proxy(proxy, url).await else {
                continue;
            };
            match self.policy.rejection(&body) {
                None => {
                    info!(proxy = proxy.host(), bytes = body.len(), "listing fetched");
                    let content = self.prepare(body);
                    return Acquisition::Fetched { content };
                }
                Some(reason) => {
                    debug!(proxy = proxy.host(), ?reason, "proxy response rejected");
                }
            }
        }
        warn!(url, "all proxies exhausted, manual paste required");
        Acquisition::NeedsManualPaste
    }

    async fn try_proxy(&self, proxy: &ProxyEndpoint, url: &str) -> Option<String> {
        let response = match self
            .client
            .get(proxy.request_url(url))
            .timeout(self.policy.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connect"
                } else {
                    "request"
                };
                debug!(proxy = proxy.host(), kind, error = %e, "proxy request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(proxy = proxy.host(), status = %response.status(), "proxy returned an error");
            return None;
        }

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                debug!(proxy = proxy.host(), error = %e, "proxy body unreadable");
                None
            }
        }
    }

    fn prepare(&self, body: String) -> String {
        let Some(min_chars) = self.condense_min_chars else {
            return body;
        };
        if !looks_like_html(&body) {
            return body;
        }
        let text = condense_html(&body);
        if text.trim().chars().count() >= min_chars {
            debug!(raw = body.len(), condensed = text.len(), "condensed listing html");
            text
        } else {
            body
        }
    }
}

// ── HTML condensation ────────────────────────────────────────────────────────

fn looks_like_html(body: &str) -> bool {
    let head: String = body.chars().take(4096).collect();
    HTML_DOCUMENT_RE.is_match(&head)
}

/// Reduce an HTML document to its title and visible body text.
pub fn condense_html(html: &str) -> String {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SEL)
        .next()
        .map(|el| normalize_line(&collect_text(el)))
        .filter(|t| !t.is_empty());

    let body_text = match document.select(&BODY_SEL).next() {
        Some(body) => collect_text(body),
        None => collect_text(document.root_element()),
    };

    let lines: Vec<String> = body_text.lines().map(normalize_line).collect();
    let body = MULTI_NEWLINE_RE
        .replace_all(lines.join("\n").trim(), "\n\n")
        .into_owned();

    match title {
        Some(title) => format!("{title}\n\n{body}"),
        None => body,
    }
}

/// Visible text of an element, with block boundaries kept as newlines.
fn collect_text(el: ElementRef<'_>) -> String {
    use scraper::node::Node;
    let mut out = String::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                if SKIPPED_TAGS.contains(&element.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    let inner = collect_text(child_el);
                    if is_block(element.name()) {
                        out.push('\n');
                        out.push_str(&inner);
                        out.push('\n');
                    } else {
                        out.push_str(&inner);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div" | "section" | "article" | "main" | "header" | "footer" | "li" | "ul" | "ol"
            | "table" | "tr" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "br" | "dd" | "dt"
            | "figure" | "figcaption" | "blockquote" | "aside" | "nav"
    )
}

fn normalize_line(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const TARGET: &str = "https://bringatrailer.com/listing/2003-porsche-911/";

    fn policy() -> AcceptancePolicy {
        AcceptancePolicy {
            timeout: Duration::from_secs(2),
            min_body_chars: 1000,
            denial_markers: vec!["Access Denied".to_string()],
        }
    }

    fn acquirer(templates: &[String], condense: bool) -> Acquirer {
        let config = AcquisitionConfig {
            proxies: templates
                .iter()
                .map(|t| ProxyEndpoint::new(t.clone()).unwrap())
                .collect(),
            policy: policy(),
            condense_html: condense,
            insecure_tls: false,
        };
        Acquirer::new(&config, 100).unwrap()
    }

    fn long_text(fill: &str) -> String {
        fill.repeat(2000 / fill.len() + 1)
    }

    #[test]
    fn request_url_percent_encodes_target() {
        let proxy = ProxyEndpoint::new("https://api.allorigins.win/raw?url={url}").unwrap();
        assert_eq!(
            proxy.request_url("https://example.com/a b?x=1&y=2"),
            "https://api.allorigins.win/raw?url=https%3A%2F%2Fexample.com%2Fa+b%3Fx%3D1%26y%3D2"
        );
        assert_eq!(proxy.host(), "api.allorigins.win");
    }

    #[test]
    fn template_must_contain_placeholder() {
        assert!(ProxyEndpoint::new("https://relay.example/raw").is_err());
    }

    #[test]
    fn policy_rejects_short_and_denied_bodies() {
        let policy = policy();
        assert_eq!(policy.rejection(&"x".repeat(1000)), Some(Rejection::TooShort));
        assert_eq!(policy.rejection(&"x".repeat(1001)), None);
        let denied = format!("{} Access Denied", "x".repeat(1200));
        assert_eq!(policy.rejection(&denied), Some(Rejection::Denied));
    }

    #[tokio::test]
    async fn first_acceptable_proxy_wins() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET).path("/first").query_param("url", TARGET);
                then.status(200).body(long_text("plain listing text. "));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET).path("/second");
                then.status(200).body(long_text("other text. "));
            })
            .await;

        let acquirer = acquirer(
            &[server.url("/first?url={url}"), server.url("/second?quest={url}")],
            true,
        );
        let outcome = acquirer.fetch_listing(TARGET).await;

        first.assert_async().await;
        assert_eq!(second.hits_async().await, 0);
        match outcome {
            Acquisition::Fetched { content } => assert!(content.starts_with("plain listing text.")),
            other => panic!("expected fetched content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn falls_through_short_and_failing_proxies() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/short");
                then.status(200).body("tiny");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/error");
                then.status(503).body(long_text("upstream down "));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/good");
                then.status(200).body(long_text("mileage 41k "));
            })
            .await;

        let acquirer = acquirer(
            &[
                server.url("/short?url={url}"),
                server.url("/error?url={url}"),
                server.url("/good?url={url}"),
            ],
            false,
        );
        let outcome = acquirer.fetch_listing(TARGET).await;
        assert!(matches!(outcome, Acquisition::Fetched { .. }));
    }

    #[tokio::test]
    async fn exhausted_proxies_require_manual_paste() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/denied");
                then.status(200)
                    .body(format!("<h1>Access Denied</h1>{}", long_text("blocked ")));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/short");
                then.status(200).body("x".repeat(1000));
            })
            .await;

        let acquirer = acquirer(
            &[
                // Nothing listens on port 9; the connect error is swallowed.
                "http://127.0.0.1:9/raw?url={url}".to_string(),
                server.url("/denied?url={url}"),
                server.url("/short?url={url}"),
            ],
            true,
        );
        assert_eq!(acquirer.fetch_listing(TARGET).await, Acquisition::NeedsManualPaste);
    }

    #[tokio::test]
    async fn html_bodies_are_condensed_to_visible_text() {
        let html = format!(
            "<!DOCTYPE html><html><head><title>2003 Porsche 911</title>\
             <style>.x {{ color: red }}</style></head><body>\
             <script>var tracking = 1;</script>\
             <h1>2003 Porsche 911 Carrera 4S</h1><p>{}</p></body></html>",
            long_text("Six-speed manual, 41k miles. ")
        );
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/raw");
                then.status(200).body(html.clone());
            })
            .await;

        let acquirer = acquirer(&[server.url("/raw?url={url}")], true);
        let Acquisition::Fetched { content } = acquirer.fetch_listing(TARGET).await else {
            panic!("expected fetched content");
        };
        assert!(content.starts_with("2003 Porsche 911\n\n2003 Porsche 911 Carrera 4S"));
        assert!(content.contains("Six-speed manual"));
        assert!(!content.contains("tracking"));
        assert!(!content.contains("color: red"));
    }

    #[test]
    fn condensed_text_falls_back_to_raw_when_too_thin() {
        let html = format!(
            "<html><body><script>{}</script><p>hi</p></body></html>",
            long_text("var a = 1; ")
        );
        let acquirer = acquirer(&["http://relay.invalid/?u={url}".to_string()], true);
        assert_eq!(acquirer.prepare(html.clone()), html);
    }
}
