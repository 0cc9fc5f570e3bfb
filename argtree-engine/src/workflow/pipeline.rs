//! Analysis workflow orchestrator
//!
//! # Phases
//! - **Extraction**: transcript → [`ArgumentStructure`]
//! - **Research**: each thesis independently, at most
//!   `max_concurrent_theses` at a time, sharing one [`Resilience`]
//! - **Report**: markdown rendering, then the bundle is stored as completed
//!
//! # Error Handling
//! - Only extraction can fail a run (transcript too short, embedding
//!   service unreachable); the run is then stored as failed
//! - A failed or pending run never replaces a completed analysis of the
//!   same mode
//!
//! # Example
//! ```rust,ignore
//! let workflow = AnalysisWorkflow::new(&config, services);
//! let response = workflow.analyze("video-42", &transcript, AnalysisMode::Balanced, false).await?;
//! println!("{}", response.bundle.generated_report);
//! ```

use super::thesis::{ThesisOutcome, ThesisResearcher};
use super::{Services, WorkflowEvent};
use crate::analysis::render_report;
use crate::cache::{AvailableAnalysis, CacheReason, CacheSelector};
use crate::error::EngineResult;
use crate::extraction::ExtractionPipeline;
use crate::resilience::{Resilience, RetryPolicy};
use crate::types::{AgentOutcome, AnalysisBundle, AnalysisMode, AnalysisStatus, AnalysisStore, ArgumentStructure};
use argtree_common::config::TomlConfig;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info};

/// Bundle served for a request, with how it was obtained
#[derive(Debug, Clone)]
pub struct AnalysisResponse {
    pub bundle: AnalysisBundle,
    pub cache_reason: CacheReason,
    pub from_cache: bool,
}

pub struct AnalysisWorkflow {
    extraction: ExtractionPipeline,
    researcher: ThesisResearcher,
    resilience: Arc<Resilience>,
    store: Arc<dyn AnalysisStore>,
    selector: CacheSelector,
    max_concurrent_theses: usize,
    event_tx: Option<mpsc::Sender<WorkflowEvent>>,
}

impl AnalysisWorkflow {
    pub fn new(config: &TomlConfig, services: Services) -> Self {
        let resilience = Arc::new(Resilience::from_config(&config.research));
        let extraction = ExtractionPipeline::new(config.extraction.clone(), services.llm.clone(), services.embedder.clone())
            .with_embedding_retry(RetryPolicy::from(&config.research.retry));
        Self {
            extraction,
            researcher: ThesisResearcher::new(config, &services, resilience.clone()),
            resilience,
            selector: CacheSelector::new(services.store.clone(), config.cache.max_age_days),
            store: services.store,
            max_concurrent_theses: config.research.max_concurrent_theses.max(1),
            event_tx: None,
        }
    }

    /// Stream progress events to `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::Sender<WorkflowEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Shared per-agent rate limiters and breakers
    pub fn resilience(&self) -> &Arc<Resilience> {
        &self.resilience
    }

    /// Serve the best cached analysis, or run a fresh one in `mode`
    pub async fn analyze(
        &self,
        input_id: &str,
        transcript: &str,
        mode: AnalysisMode,
        force_refresh: bool,
    ) -> EngineResult<AnalysisResponse> {
        let decision = self.selector.select(input_id, mode, force_refresh).await?;
        if let Some(bundle) = decision.bundle {
            return Ok(AnalysisResponse {
                bundle,
                cache_reason: decision.reason,
                from_cache: true,
            });
        }

        let bundle = self.run(input_id, transcript, mode, None).await?;
        Ok(AnalysisResponse {
            bundle,
            cache_reason: decision.reason,
            from_cache: false,
        })
    }

    /// Run the full pipeline and store the result
    pub async fn run(
        &self,
        input_id: &str,
        transcript: &str,
        mode: AnalysisMode,
        language_hint: Option<&str>,
    ) -> EngineResult<AnalysisBundle> {
        let mut bundle = AnalysisBundle::pending(input_id, mode);
        let run_id = bundle.run_id;
        info!(run_id = %run_id, input_id, mode = %mode, chars = transcript.len(), "Analysis started");
        self.emit(WorkflowEvent::RunStarted {
            run_id,
            input_id: input_id.to_string(),
            mode,
            timestamp: Utc::now().timestamp(),
        });
        self.store_unless_completed(&bundle).await?;

        let extraction = match self.extraction.run(transcript, language_hint).await {
            Ok(output) => output,
            Err(e) => {
                error!(run_id = %run_id, input_id, error = %e, "Analysis failed during extraction");
                bundle.status = AnalysisStatus::Failed;
                bundle.error = Some(e.to_string());
                bundle.updated_at = Utc::now();
                self.store_unless_completed(&bundle).await?;
                self.emit(WorkflowEvent::RunFailed {
                    run_id,
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        let structure = extraction.structure;
        self.emit(WorkflowEvent::ExtractionCompleted {
            chains: structure.chain_count(),
            claims: structure.total_claims,
            reclassified: structure.reclassified_count,
        });

        let outcomes = self.research_all(&structure, mode).await;
        let theses: Vec<_> = outcomes.into_iter().map(|o| o.thesis).collect();
        let unverifiable = theses.iter().filter(|t| t.reliability.is_unverifiable()).count();

        let now = Utc::now();
        bundle.generated_report = render_report(input_id, mode, &structure, &theses, now);
        bundle.structure = structure;
        bundle.theses = theses;
        bundle.status = AnalysisStatus::Completed;
        bundle.updated_at = now;
        self.store.put(input_id, mode, bundle.clone()).await?;
        if let Some(stored) = self.store.get(input_id, mode).await? {
            bundle.ratings = stored.ratings;
            bundle.created_at = stored.created_at;
        }

        info!(
            run_id = %run_id,
            input_id,
            theses = bundle.theses.len(),
            unverifiable,
            "Analysis completed"
        );
        self.emit(WorkflowEvent::RunCompleted {
            run_id,
            theses: bundle.theses.len(),
            unverifiable,
            timestamp: now.timestamp(),
        });
        Ok(bundle)
    }

    /// Research every thesis, keeping chain order
    async fn research_all(&self, structure: &ArgumentStructure, mode: AnalysisMode) -> Vec<ThesisOutcome> {
        let total_theses = structure.chains.len();
        stream::iter(&structure.chains)
            .map(|chain| async move {
                self.emit(WorkflowEvent::ThesisStarted {
                    chain_id: chain.chain_id,
                    total_theses,
                });

                let outcome = self.researcher.research(chain, mode).await;

                for report in &outcome.thesis.agent_reports {
                    if report.outcome == AgentOutcome::ShortCircuited {
                        self.emit(WorkflowEvent::AgentShortCircuited {
                            chain_id: chain.chain_id,
                            agent_id: report.agent_id.clone(),
                        });
                    }
                }
                let thesis = &outcome.thesis;
                self.emit(WorkflowEvent::ThesisResearched {
                    chain_id: chain.chain_id,
                    sources: thesis.sources.len(),
                    full_texts: thesis.sources.iter().filter(|s| s.has_fulltext()).count(),
                    evidence_items: thesis.evidence.len(),
                    reliability: thesis.reliability.score(),
                    label: thesis.reliability.label().to_string(),
                });
                outcome
            })
            .buffered(self.max_concurrent_theses)
            .collect()
            .await
    }

    /// Record a user rating for a stored analysis
    pub async fn rate(&self, input_id: &str, mode: AnalysisMode, rating: f64) -> EngineResult<()> {
        self.store.increment_rating(input_id, mode, rating).await?;
        Ok(())
    }

    pub async fn available_analyses(&self, input_id: &str) -> EngineResult<Vec<AvailableAnalysis>> {
        Ok(self.selector.available_analyses(input_id).await?)
    }

    /// Pending and failed bundles never overwrite a completed one
    async fn store_unless_completed(&self, bundle: &AnalysisBundle) -> EngineResult<()> {
        let existing = self.store.get(&bundle.input_id, bundle.mode).await?;
        if existing.is_some_and(|b| b.status == AnalysisStatus::Completed) {
            debug!(
                input_id = %bundle.input_id,
                mode = %bundle.mode,
                status = ?bundle.status,
                "Keeping stored completed analysis"
            );
            return Ok(());
        }
        self.store.put(&bundle.input_id, bundle.mode, bundle.clone()).await?;
        Ok(())
    }

    /// Never waits on a slow consumer; events that do not fit are dropped
    fn emit(&self, event: WorkflowEvent) {
        let Some(tx) = &self.event_tx else { return };
        match tx.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                debug!(?event, "Event channel full, dropping progress event");
            }
        }
    }
}
