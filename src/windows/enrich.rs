use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::loader::EnrichmentConfig;
use crate::models::WindowMetadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    BrowserUrl(String),
    EditorWorkspace(String),
}

impl Enrichment {
    fn apply(self, window: &mut WindowMetadata) {
        match self {
            Enrichment::BrowserUrl(url) => window.browser_url = Some(url),
            Enrichment::EditorWorkspace(workspace) => window.editor_workspace = Some(workspace),
        }
    }
}

/// Best-effort metadata lookup. Errors are never fatal to the caller.
#[async_trait]
pub trait Enricher: Send + Sync {
    fn name(&self) -> &'static str;

    fn applies_to(&self, window: &WindowMetadata) -> bool;

    /// Called once per cycle before any lookup.
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    async fn lookup(&self, window: &WindowMetadata) -> Result<Option<Enrichment>>;
}

pub struct EnrichmentPipeline {
    enrichers: Vec<Box<dyn Enricher>>,
    timeout: Duration,
}

impl EnrichmentPipeline {
    pub fn new(timeout: Duration) -> Self {
        Self {
            enrichers: Vec::new(),
            timeout,
        }
    }

    pub fn from_config(config: &EnrichmentConfig, timeout: Duration) -> Self {
        let pipeline = Self::new(timeout);
        if !config.enabled {
            return pipeline;
        }
        pipeline
            .with(BrowserTabEnricher::new(
                &config.browser_debug_url,
                config.browser_processes.clone(),
            ))
            .with(EditorWorkspaceEnricher::new(config.editor_processes.clone()))
    }

    pub fn with(mut self, enricher: impl Enricher + 'static) -> Self {
        self.enrichers.push(Box::new(enricher));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.enrichers.is_empty()
    }

    /// Fills enrichment fields in place. Slow or failing enrichers leave
    /// fields untouched.
    pub async fn enrich(&self, windows: &mut [WindowMetadata]) {
        let limit = self.timeout;

        let wanted: Vec<&dyn Enricher> = self
            .enrichers
            .iter()
            .map(|e| e.as_ref())
            .filter(|e| windows.iter().any(|w| e.applies_to(w)))
            .collect();

        let refreshed = join_all(wanted.iter().map(|enricher| async move {
            match tokio::time::timeout(limit, enricher.refresh()).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    tracing::debug!("Enricher {} unavailable: {:#}", enricher.name(), e);
                    false
                }
                Err(_) => {
                    tracing::debug!("Enricher {} refresh timed out", enricher.name());
                    false
                }
            }
        }))
        .await;

        let ready: Vec<&dyn Enricher> = wanted
            .into_iter()
            .zip(refreshed)
            .filter_map(|(enricher, ok)| ok.then_some(enricher))
            .collect();

        if ready.is_empty() {
            return;
        }

        let lookups = windows.iter().enumerate().flat_map(|(idx, window)| {
            ready
                .iter()
                .copied()
                .filter(move |enricher| enricher.applies_to(window))
                .map(move |enricher| async move {
                    let found = match tokio::time::timeout(limit, enricher.lookup(window)).await {
                        Ok(Ok(found)) => found,
                        Ok(Err(e)) => {
                            tracing::debug!(
                                "Enricher {} failed for {:?}: {:#}",
                                enricher.name(),
                                window.title,
                                e
                            );
                            None
                        }
                        Err(_) => {
                            tracing::debug!(
                                "Enricher {} timed out for {:?}",
                                enricher.name(),
                                window.title
                            );
                            None
                        }
                    };
                    (idx, found)
                })
        });

        let results: Vec<(usize, Option<Enrichment>)> = join_all(lookups).await;

        for (idx, found) in results {
            if let (Some(enrichment), Some(window)) = (found, windows.get_mut(idx)) {
                enrichment.apply(window);
            }
        }
    }
}

fn process_matches(window: &WindowMetadata, processes: &[String]) -> bool {
    let Some(name) = window.process_name.as_deref() else {
        return false;
    };
    let name = name.to_lowercase();
    let name = name.trim_end_matches(".exe");
    processes.iter().any(|p| p.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevToolsTarget {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// Browser tab URL lookup through a Chromium remote debugging endpoint.
pub struct BrowserTabEnricher {
    client: reqwest::Client,
    list_url: String,
    processes: Vec<String>,
    targets: Mutex<Vec<DevToolsTarget>>,
}

impl BrowserTabEnricher {
    pub fn new(debug_url: &str, processes: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            list_url: format!("{}/json/list", debug_url.trim_end_matches('/')),
            processes,
            targets: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Enricher for BrowserTabEnricher {
    fn name(&self) -> &'static str {
        "browser-tab"
    }

    fn applies_to(&self, window: &WindowMetadata) -> bool {
        process_matches(window, &self.processes)
    }

    async fn refresh(&self) -> Result<()> {
        let targets: Vec<DevToolsTarget> = self
            .client
            .get(&self.list_url)
            .send()
            .await
            .context("DevTools endpoint unreachable")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed DevTools target list")?;

        *self.targets.lock().await = targets
            .into_iter()
            .filter(|t| t.kind == "page")
            .collect();
        Ok(())
    }

    async fn lookup(&self, window: &WindowMetadata) -> Result<Option<Enrichment>> {
        let targets = self.targets.lock().await;
        Ok(match_tab(&targets, &window.title).map(Enrichment::BrowserUrl))
    }
}

/// Browsers title their windows "<tab title> - <browser name>"; the best
/// match is the longest tab title the window title starts with.
fn match_tab(targets: &[DevToolsTarget], window_title: &str) -> Option<String> {
    targets
        .iter()
        .filter(|t| !t.title.is_empty() && window_title.starts_with(&t.title))
        .max_by_key(|t| t.title.len())
        .map(|t| t.url.clone())
}

/// Editor workspace lookup derived from the editor's title convention
/// ("<file> - <workspace> - <editor>").
pub struct EditorWorkspaceEnricher {
    processes: Vec<String>,
}

impl EditorWorkspaceEnricher {
    pub fn new(processes: Vec<String>) -> Self {
        Self { processes }
    }
}

#[async_trait]
impl Enricher for EditorWorkspaceEnricher {
    fn name(&self) -> &'static str {
        "editor-workspace"
    }

    fn applies_to(&self, window: &WindowMetadata) -> bool {
        process_matches(window, &self.processes)
    }

    async fn lookup(&self, window: &WindowMetadata) -> Result<Option<Enrichment>> {
        Ok(parse_editor_workspace(&window.title).map(Enrichment::EditorWorkspace))
    }
}

const EDITOR_SUFFIXES: &[&str] = &["Visual Studio Code", "VSCodium", "Cursor", "Code - OSS"];

fn parse_editor_workspace(title: &str) -> Option<String> {
    let title = title.trim_start_matches('●').trim();
    let parts = split_title(title);
    let (last, rest) = parts.split_last()?;
    if !EDITOR_SUFFIXES.iter().any(|suffix| last.eq_ignore_ascii_case(suffix)) {
        return None;
    }
    rest.last().map(|workspace| workspace.to_string())
}

fn split_title(title: &str) -> Vec<&str> {
    title
        .split(" - ")
        .flat_map(|part| part.split(" \u{2014} "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticEnricher {
        fail_refresh: bool,
        delay: Duration,
    }

    #[async_trait]
    impl Enricher for StaticEnricher {
        fn name(&self) -> &'static str {
            "static"
        }

        fn applies_to(&self, window: &WindowMetadata) -> bool {
            window.process_name.as_deref() == Some("chrome")
        }

        async fn refresh(&self) -> Result<()> {
            if self.fail_refresh {
                anyhow::bail!("bridge down");
            }
            Ok(())
        }

        async fn lookup(&self, window: &WindowMetadata) -> Result<Option<Enrichment>> {
            tokio::time::sleep(self.delay).await;
            Ok(Some(Enrichment::BrowserUrl(format!(
                "https://example.test/{}",
                window.title
            ))))
        }
    }

    fn target(title: &str, url: &str) -> DevToolsTarget {
        DevToolsTarget {
            kind: "page".to_string(),
            title: title.to_string(),
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn pipeline_applies_results_to_matching_windows() {
        let pipeline = EnrichmentPipeline::new(Duration::from_millis(200)).with(StaticEnricher {
            fail_refresh: false,
            delay: Duration::ZERO,
        });
        let mut windows = vec![
            WindowMetadata::titled("docs").with_process("chrome"),
            WindowMetadata::titled("shell").with_process("bash"),
        ];

        pipeline.enrich(&mut windows).await;

        assert_eq!(
            windows[0].browser_url.as_deref(),
            Some("https://example.test/docs")
        );
        assert!(windows[1].browser_url.is_none());
    }

    #[tokio::test]
    async fn pipeline_slow_lookup_leaves_field_empty() {
        let pipeline = EnrichmentPipeline::new(Duration::from_millis(20)).with(StaticEnricher {
            fail_refresh: false,
            delay: Duration::from_secs(5),
        });
        let mut windows = vec![WindowMetadata::titled("docs").with_process("chrome")];

        pipeline.enrich(&mut windows).await;

        assert!(
            windows[0].browser_url.is_none(),
            "enrich: timed out lookups must degrade to empty"
        );
    }

    #[tokio::test]
    async fn pipeline_unreachable_bridge_leaves_field_empty() {
        let pipeline = EnrichmentPipeline::new(Duration::from_millis(200)).with(StaticEnricher {
            fail_refresh: true,
            delay: Duration::ZERO,
        });
        let mut windows = vec![WindowMetadata::titled("docs").with_process("chrome")];

        pipeline.enrich(&mut windows).await;

        assert!(windows[0].browser_url.is_none());
    }

    #[tokio::test]
    async fn browser_enricher_unreachable_endpoint_errors_on_refresh() {
        let enricher = BrowserTabEnricher::new("http://127.0.0.1:9", vec!["chrome".to_string()]);
        assert!(enricher.refresh().await.is_err());
    }

    #[test]
    fn match_tab_prefers_longest_prefix() {
        let targets = vec![
            target("Docs", "https://a.test"),
            target("Docs - Rust", "https://b.test"),
        ];
        assert_eq!(
            match_tab(&targets, "Docs - Rust - Google Chrome").as_deref(),
            Some("https://b.test")
        );
        assert_eq!(match_tab(&targets, "Inbox - Google Chrome"), None);
    }

    #[test]
    fn match_tab_ignores_untitled_targets() {
        let targets = vec![target("", "about:blank")];
        assert_eq!(match_tab(&targets, "anything"), None);
    }

    #[test]
    fn parse_editor_workspace_reads_middle_segment() {
        assert_eq!(
            parse_editor_workspace("app.py - wintrack - Visual Studio Code").as_deref(),
            Some("wintrack")
        );
        assert_eq!(
            parse_editor_workspace("wintrack - Cursor").as_deref(),
            Some("wintrack")
        );
    }

    #[test]
    fn parse_editor_workspace_handles_em_dash_and_dirty_marker() {
        assert_eq!(
            parse_editor_workspace("● main.rs \u{2014} wintrack \u{2014} Visual Studio Code")
                .as_deref(),
            Some("wintrack")
        );
    }

    #[test]
    fn parse_editor_workspace_requires_editor_suffix() {
        assert_eq!(parse_editor_workspace("Inbox - Mail"), None);
        assert_eq!(parse_editor_workspace("Visual Studio Code"), None);
    }

    #[test]
    fn process_matches_is_case_insensitive_and_strips_exe() {
        let processes = vec!["code".to_string()];
        assert!(process_matches(
            &WindowMetadata::titled("x").with_process("Code.exe"),
            &processes
        ));
        assert!(!process_matches(&WindowMetadata::titled("x"), &processes));
    }
}
