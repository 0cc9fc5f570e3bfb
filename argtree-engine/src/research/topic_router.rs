//! Topic routing: thesis → categories → ordered agent set
//!
//! The LLM picks 1-3 categories; the category → agents table is static.
//! Configured fallback agents are always appended so every strategy has at
//! least one general-purpose agent.

use crate::prompts;
use crate::types::{complete_as, LlmClient};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

const MAX_CATEGORIES: usize = 3;

/// Research topic category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
    Medicine,
    Biology,
    Psychology,
    Economics,
    Physics,
    ComputerScience,
    Mathematics,
    Environment,
    SocialSciences,
    Education,
    Politics,
    CurrentEvents,
    FactCheck,
    General,
}

impl TopicCategory {
    pub const ALL: [TopicCategory; 14] = [
        TopicCategory::Medicine,
        TopicCategory::Biology,
        TopicCategory::Psychology,
        TopicCategory::Economics,
        TopicCategory::Physics,
        TopicCategory::ComputerScience,
        TopicCategory::Mathematics,
        TopicCategory::Environment,
        TopicCategory::SocialSciences,
        TopicCategory::Education,
        TopicCategory::Politics,
        TopicCategory::CurrentEvents,
        TopicCategory::FactCheck,
        TopicCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicCategory::Medicine => "medicine",
            TopicCategory::Biology => "biology",
            TopicCategory::Psychology => "psychology",
            TopicCategory::Economics => "economics",
            TopicCategory::Physics => "physics",
            TopicCategory::ComputerScience => "computer_science",
            TopicCategory::Mathematics => "mathematics",
            TopicCategory::Environment => "environment",
            TopicCategory::SocialSciences => "social_sciences",
            TopicCategory::Education => "education",
            TopicCategory::Politics => "politics",
            TopicCategory::CurrentEvents => "current_events",
            TopicCategory::FactCheck => "fact_check",
            TopicCategory::General => "general",
        }
    }

    /// Agents consulted for this category, most specialized first
    pub fn agents(&self) -> &'static [&'static str] {
        match self {
            TopicCategory::Medicine => &["pubmed", "europepmc", "semantic_scholar", "crossref"],
            TopicCategory::Biology => &["pubmed", "semantic_scholar", "crossref", "arxiv"],
            TopicCategory::Psychology => &["pubmed", "semantic_scholar", "crossref"],
            TopicCategory::Economics => &["oecd", "world_bank", "semantic_scholar", "crossref"],
            TopicCategory::Physics | TopicCategory::ComputerScience | TopicCategory::Mathematics => {
                &["arxiv", "semantic_scholar", "crossref"]
            }
            TopicCategory::Environment => &["arxiv", "semantic_scholar", "crossref", "oecd"],
            TopicCategory::SocialSciences | TopicCategory::Education => &["semantic_scholar", "crossref", "oecd"],
            TopicCategory::Politics => &["semantic_scholar", "crossref"],
            TopicCategory::CurrentEvents => &["news", "fact_check", "semantic_scholar"],
            TopicCategory::FactCheck => &["fact_check", "news", "crossref"],
            TopicCategory::General => &["semantic_scholar", "crossref"],
        }
    }

    /// Agent whose results matter most for this category
    pub fn priority_agent(&self) -> &'static str {
        match self {
            TopicCategory::Medicine | TopicCategory::Biology | TopicCategory::Psychology => "pubmed",
            TopicCategory::Economics => "oecd",
            TopicCategory::Physics | TopicCategory::ComputerScience | TopicCategory::Mathematics => "arxiv",
            TopicCategory::CurrentEvents => "news",
            TopicCategory::FactCheck => "fact_check",
            _ => "semantic_scholar",
        }
    }
}

impl fmt::Display for TopicCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-', '/'], "_");
        match normalized.as_str() {
            "cs" | "computer_science" | "computing" => Ok(TopicCategory::ComputerScience),
            "math" | "maths" => Ok(TopicCategory::Mathematics),
            "social_science" => Ok(TopicCategory::SocialSciences),
            "news" | "current_event" => Ok(TopicCategory::CurrentEvents),
            "factcheck" | "fact_checking" => Ok(TopicCategory::FactCheck),
            other => TopicCategory::ALL
                .iter()
                .find(|c| c.as_str() == other)
                .copied()
                .ok_or_else(|| format!("unknown category: {}", s)),
        }
    }
}

/// Categories plus the ordered agents to consult
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchStrategy {
    pub categories: Vec<TopicCategory>,
    pub agents: Vec<String>,
    pub priority_agent: String,
}

/// Resolve categories to a strategy (pure table lookup)
///
/// The priority agent of the first category leads, then each category's
/// agents in order, then any fallback agents not yet present.
pub fn strategy_for(categories: &[TopicCategory], fallback_agents: &[String]) -> ResearchStrategy {
    let categories: Vec<TopicCategory> = if categories.is_empty() {
        vec![TopicCategory::General]
    } else {
        categories.to_vec()
    };
    let priority_agent = categories[0].priority_agent().to_string();

    let mut agents: Vec<String> = vec![priority_agent.clone()];
    let table_agents = categories.iter().flat_map(|c| c.agents().iter().map(|a| a.to_string()));
    for agent in table_agents.chain(fallback_agents.iter().cloned()) {
        if !agents.contains(&agent) {
            agents.push(agent);
        }
    }

    ResearchStrategy {
        categories,
        agents,
        priority_agent,
    }
}

#[derive(Debug, Deserialize)]
struct TopicResponse {
    categories: Vec<String>,
}

pub struct TopicRouter {
    llm: Arc<dyn LlmClient>,
    fallback_agents: Vec<String>,
}

impl TopicRouter {
    pub fn new(llm: Arc<dyn LlmClient>, fallback_agents: Vec<String>) -> Self {
        Self { llm, fallback_agents }
    }

    /// Classify a claim; failures route to `general`
    pub async fn classify(&self, claim: &str) -> Vec<TopicCategory> {
        let allowed = TopicCategory::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ");
        let response = complete_as::<TopicResponse>(self.llm.as_ref(), &prompts::classify_topic(claim, &allowed)).await;

        let mut categories = Vec::new();
        match response {
            Ok(response) => {
                for raw in &response.categories {
                    match raw.parse::<TopicCategory>() {
                        Ok(c) if !categories.contains(&c) => categories.push(c),
                        Ok(_) => {}
                        Err(e) => debug!(error = %e, "Ignoring unknown topic category"),
                    }
                    if categories.len() == MAX_CATEGORIES {
                        break;
                    }
                }
            }
            Err(e) => warn!(error = %e, "Topic classification failed, routing to general"),
        }

        if categories.is_empty() {
            categories.push(TopicCategory::General);
        }
        categories
    }

    pub async fn route(&self, claim: &str) -> ResearchStrategy {
        let categories = self.classify(claim).await;
        let strategy = strategy_for(&categories, &self.fallback_agents);
        debug!(
            categories = ?strategy.categories,
            agents = ?strategy.agents,
            priority = %strategy.priority_agent,
            "Research strategy selected"
        );
        strategy
    }
}
