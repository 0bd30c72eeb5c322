//! Fallback-chain music selection.
//!
//! Providers are tried in order and the first one that yields a track wins:
//!
//! 1. External catalog (optional). Errors are logged and skipped.
//! 2. Internal catalog, relaxing the query pass by pass:
//!    (a) tags and duration window, (b) tags only, (c) window only,
//!    (d) anything.
//! 3. Generator (optional). If it fails, one last unconstrained pick from
//!    the internal catalog.
//!
//! Exhausting the chain yields `None`. Selection never returns an error.

use std::sync::{Arc, Mutex};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::scoring::{pick_top, DurationWindow};
use crate::jobs::SelectionSource;
use crate::metrics::MetricsCollector;
use crate::ports::{CatalogQuery, ResourceCatalog, ResourceGenerator, Track};
use crate::retry::Retrier;

/// What the caller wants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    #[serde(default)]
    pub tags: Vec<String>,
    pub target_duration_seconds: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl SelectionRequest {
    pub fn new(target_duration_seconds: f64) -> Self {
        Self {
            target_duration_seconds,
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Prompt for the generator: the description, else the tags.
    fn generation_prompt(&self) -> String {
        match &self.description {
            Some(d) if !d.trim().is_empty() => d.clone(),
            _ if !self.tags.is_empty() => format!("{} background music", self.tags.join(", ")),
            _ => "instrumental background music".to_string(),
        }
    }
}

/// The chosen track and the provider that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResult {
    pub track: Track,
    pub source: SelectionSource,
}

/// Internal relaxation passes, strictest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    TagsAndWindow,
    TagsOnly,
    WindowOnly,
    Any,
}

impl Pass {
    const ALL: [Pass; 4] = [Pass::TagsAndWindow, Pass::TagsOnly, Pass::WindowOnly, Pass::Any];

    fn query(self, request: &SelectionRequest) -> CatalogQuery {
        let window = DurationWindow::around(request.target_duration_seconds);
        let (tags, window) = match self {
            Pass::TagsAndWindow => (request.tags.clone(), Some(window)),
            Pass::TagsOnly => (request.tags.clone(), None),
            Pass::WindowOnly => (Vec::new(), Some(window)),
            Pass::Any => (Vec::new(), None),
        };
        CatalogQuery {
            tags,
            min_duration_seconds: window.map(|w| w.min),
            max_duration_seconds: window.map(|w| w.max),
            description: request.description.clone(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Pass::TagsAndWindow => "tags_and_window",
            Pass::TagsOnly => "tags_only",
            Pass::WindowOnly => "window_only",
            Pass::Any => "any",
        }
    }
}

/// Walks the fallback chain for one request.
pub struct MusicSelector {
    external: Option<Arc<dyn ResourceCatalog>>,
    internal: Option<Arc<dyn ResourceCatalog>>,
    generator: Option<Arc<dyn ResourceGenerator>>,
    retrier: Retrier,
    rng: Mutex<ChaCha8Rng>,
    metrics: MetricsCollector,
}

impl MusicSelector {
    /// Creates a selector with no providers and an entropy-seeded RNG.
    pub fn new(retrier: Retrier) -> Self {
        Self {
            external: None,
            internal: None,
            generator: None,
            retrier,
            rng: Mutex::new(ChaCha8Rng::from_rng(&mut rand::rng())),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_external_catalog(mut self, catalog: Arc<dyn ResourceCatalog>) -> Self {
        self.external = Some(catalog);
        self
    }

    pub fn with_internal_catalog(mut self, catalog: Arc<dyn ResourceCatalog>) -> Self {
        self.internal = Some(catalog);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn ResourceGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Makes the top-3 draw reproducible.
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn with_rng(mut self, rng: ChaCha8Rng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Runs the chain. `None` means no provider produced anything.
    pub async fn select(&self, request: &SelectionRequest) -> Option<SelectionResult> {
        let result = self.run_chain(request).await;
        let source = result.as_ref().map(|r| r.source.as_str()).unwrap_or("none");
        self.metrics.record_music_selection(source);

        match &result {
            Some(r) => info!(
                source = %r.source,
                track_id = %r.track.id,
                duration = r.track.duration_seconds,
                "Music selected"
            ),
            None => warn!(tags = ?request.tags, "No music available, continuing without"),
        }
        result
    }

    async fn run_chain(&self, request: &SelectionRequest) -> Option<SelectionResult> {
        if let Some(external) = &self.external {
            if let Some(track) = self.from_external(external.as_ref(), request).await {
                return Some(SelectionResult {
                    track,
                    source: SelectionSource::ExternalCatalog,
                });
            }
        }

        if let Some(internal) = &self.internal {
            for pass in Pass::ALL {
                if let Some(track) = self.search_and_pick(internal.as_ref(), pass, request).await {
                    return Some(SelectionResult {
                        track,
                        source: SelectionSource::InternalCatalog,
                    });
                }
            }
        }

        if let Some(generator) = &self.generator {
            let prompt = request.generation_prompt();
            let duration = request.target_duration_seconds;
            match self
                .retrier
                .call("music_generation", || generator.generate(&prompt, duration))
                .await
            {
                Ok(mut track) => {
                    track.is_generated = true;
                    return Some(SelectionResult {
                        track,
                        source: SelectionSource::Generated,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Music generation failed, trying last-resort catalog pick");
                    if let Some(internal) = &self.internal {
                        if let Some(track) =
                            self.search_and_pick(internal.as_ref(), Pass::Any, request).await
                        {
                            return Some(SelectionResult {
                                track,
                                source: SelectionSource::InternalCatalog,
                            });
                        }
                    }
                }
            }
        }

        None
    }

    async fn from_external(
        &self,
        catalog: &dyn ResourceCatalog,
        request: &SelectionRequest,
    ) -> Option<Track> {
        let query = Pass::TagsAndWindow.query(request);
        match self
            .retrier
            .call("external_catalog", || catalog.search(&query))
            .await
        {
            Ok(candidates) => self.pick(candidates, request),
            Err(e) => {
                warn!(error = %e, "External catalog failed, falling back");
                None
            }
        }
    }

    async fn search_and_pick(
        &self,
        catalog: &dyn ResourceCatalog,
        pass: Pass,
        request: &SelectionRequest,
    ) -> Option<Track> {
        let query = pass.query(request);
        match self
            .retrier
            .call("internal_catalog", || catalog.search(&query))
            .await
        {
            Ok(candidates) => {
                debug!(pass = pass.label(), candidates = candidates.len(), "Internal catalog pass");
                self.pick(candidates, request)
            }
            Err(e) => {
                warn!(pass = pass.label(), error = %e, "Internal catalog search failed");
                None
            }
        }
    }

    fn pick(&self, candidates: Vec<Track>, request: &SelectionRequest) -> Option<Track> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pick_top(
            candidates,
            &request.tags,
            request.target_duration_seconds,
            &mut *rng,
        )
    }
}

impl std::fmt::Debug for MusicSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicSelector")
            .field("external", &self.external.is_some())
            .field("internal", &self.internal.is_some())
            .field("generator", &self.generator.is_some())
            .finish()
    }
}
