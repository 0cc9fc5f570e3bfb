//! Research of one thesis, from routing to reliability
//!
//! Topic Router → Query Generator → Research Orchestrator → Relevance
//! Screener → Enricher → Evidence Analyzer → Reliability Aggregator
//!
//! Every stage degrades instead of failing; the worst case is an empty
//! source pool and an unverifiable thesis.

use super::Services;
use crate::analysis::{reliability, EvidenceAnalyzer};
use crate::enrichment::{Enricher, EnrichmentStats, RelevanceScreener, ScreeningOutcome, ScreeningParams};
use crate::research::{QueryGenerator, ResearchOrchestrator, TopicRouter};
use crate::resilience::Resilience;
use crate::types::{AnalysisMode, EnrichedThesis, ReasoningChain};
use argtree_common::config::{ScreeningConfig, TomlConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Result of researching one thesis
#[derive(Debug, Clone)]
pub struct ThesisOutcome {
    pub thesis: EnrichedThesis,
    pub screening: ScreeningOutcome,
    pub enrichment: EnrichmentStats,
}

pub struct ThesisResearcher {
    router: TopicRouter,
    queries: QueryGenerator,
    orchestrator: ResearchOrchestrator,
    screener: RelevanceScreener,
    enricher: Enricher,
    analyzer: EvidenceAnalyzer,
    screening_config: ScreeningConfig,
    enrichment_enabled: bool,
}

impl ThesisResearcher {
    pub fn new(config: &TomlConfig, services: &Services, resilience: Arc<Resilience>) -> Self {
        Self {
            router: TopicRouter::new(services.llm.clone(), config.research.fallback_agents.clone()),
            queries: QueryGenerator::new(services.llm.clone()),
            orchestrator: ResearchOrchestrator::new(services.agents.clone(), resilience, config.research.clone()),
            screener: RelevanceScreener::new(services.llm.clone(), config.screening.clone()),
            enricher: Enricher::new(
                services.fetcher.clone(),
                services.content_cache.clone(),
                Duration::from_secs(config.enrichment.fetch_timeout_secs.max(1)),
                config.enrichment.max_content_chars,
            ),
            analyzer: EvidenceAnalyzer::new(services.llm.clone(), config.analysis.clone()),
            screening_config: config.screening.clone(),
            enrichment_enabled: config.enrichment.enabled,
        }
    }

    pub async fn research(&self, chain: &ReasoningChain, mode: AnalysisMode) -> ThesisOutcome {
        let claim = chain.thesis.pivot_text.as_str();

        let strategy = self.router.route(claim).await;
        let agents: Vec<String> = strategy
            .agents
            .into_iter()
            .filter(|agent| {
                let registered = self.orchestrator.has_agent(agent);
                if !registered {
                    debug!(agent = %agent, "Routed agent not registered, skipping");
                }
                registered
            })
            .collect();

        let queries = self.queries.generate(claim, &agents).await;
        let research = self.orchestrator.fan_out(&queries).await;
        let mut sources = research.sources;

        let params = ScreeningParams::for_mode(mode, &self.screening_config);
        let screening = self.screener.screen(claim, &mut sources, params).await;

        let enrichment = if self.enrichment_enabled {
            self.enricher.enrich(&mut sources, &screening.selected).await
        } else {
            for source in &mut sources {
                source.abstract_only = true;
            }
            EnrichmentStats::default()
        };

        let evidence = self.analyzer.analyze(claim, &sources).await;
        let reliability = reliability::aggregate(&evidence, chain.thesis.stance);

        info!(
            chain_id = chain.chain_id,
            agents = agents.len(),
            sources = sources.len(),
            full_texts = sources.iter().filter(|s| s.has_fulltext()).count(),
            evidence = evidence.len(),
            reliability = reliability.label(),
            "Thesis researched"
        );

        ThesisOutcome {
            thesis: EnrichedThesis {
                chain_id: chain.chain_id,
                thesis: chain.thesis.clone(),
                categories: strategy.categories.iter().map(|c| c.as_str().to_string()).collect(),
                sources,
                evidence,
                reliability,
                agent_reports: research.reports,
            },
            screening,
            enrichment,
        }
    }
}
