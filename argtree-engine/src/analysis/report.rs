//! Markdown rendering of an analysis

use crate::types::{AnalysisMode, ArgumentStructure, ChainNode, EnrichedThesis, EvidenceItem, Reliability, Stance};
use chrono::{DateTime, Utc};
use std::fmt::Write;

const SNIPPET_PREVIEW_CHARS: usize = 150;

fn stance_label(stance: Stance) -> &'static str {
    match stance {
        Stance::Affirmative => "affirmative",
        Stance::Conditional => "conditional",
    }
}

fn reliability_line(reliability: &Reliability, stance: Stance) -> String {
    match reliability {
        Reliability::Unverifiable => format!(
            "**Reliability: UNVERIFIABLE** (no cited evidence found) | **Stance**: {}",
            stance_label(stance)
        ),
        Reliability::Scored {
            score,
            pro_count,
            con_count,
        } => format!(
            "**Reliability**: {} ({:.2}/1.00, {} pro / {} con) | **Stance**: {}",
            reliability.label(),
            score,
            pro_count,
            con_count,
            stance_label(stance)
        ),
    }
}

fn push_node(out: &mut String, depth: usize, label: &str, node: &ChainNode) {
    let indent = "  ".repeat(depth);
    let _ = write!(out, "{}- *{}*: {}", indent, label, node.text);
    if node.pivot_text != node.text {
        let _ = write!(out, " _({})_", node.pivot_text);
    }
    if node.reclassified.is_some() {
        out.push_str(" [reclassified]");
    }
    out.push('\n');
}

fn push_evidence(out: &mut String, heading: &str, items: &[&EvidenceItem]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "#### {}", heading);
    for item in items {
        let _ = writeln!(out, "- {} ([source]({}))", item.claim_text, item.source_url);
    }
    out.push('\n');
}

/// Render the full report
pub fn render_report(
    input_id: &str,
    mode: AnalysisMode,
    structure: &ArgumentStructure,
    theses: &[EnrichedThesis],
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Argument Analysis: {}\n", input_id);
    let _ = writeln!(out, "**Date**: {}", generated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(out, "**Mode**: {}", mode);
    let _ = writeln!(
        out,
        "**Language**: {} (pivot {})",
        structure.source_language, structure.pivot_language
    );
    let _ = writeln!(
        out,
        "**Chains**: {} | **Claims**: {} | **Reclassified**: {}\n",
        structure.chain_count(),
        structure.total_claims,
        structure.reclassified_count
    );
    out.push_str("---\n\n");

    if structure.chains.is_empty() {
        out.push_str("_No arguments were extracted from this transcript._\n");
        return out;
    }

    for (n, chain) in structure.chains.iter().enumerate() {
        let _ = writeln!(out, "## Thesis {}\n", n + 1);
        let _ = writeln!(out, "> {}\n", chain.thesis.text);

        let enriched = theses.iter().find(|t| t.chain_id == chain.chain_id);
        match enriched {
            Some(thesis) => {
                let _ = writeln!(out, "{}\n", reliability_line(&thesis.reliability, chain.thesis.stance));
            }
            None => out.push_str("_Not researched._\n\n"),
        }

        if chain.total_claims() > 1 {
            out.push_str("### Structure\n");
            for sub in &chain.sub_arguments {
                push_node(&mut out, 0, "sub-argument", &sub.node);
                for evidence in &sub.evidence {
                    push_node(&mut out, 1, "evidence", evidence);
                }
            }
            for counter in &chain.counter_arguments {
                push_node(&mut out, 0, "counter-argument", &counter.node);
                for evidence in &counter.evidence {
                    push_node(&mut out, 1, "evidence", evidence);
                }
            }
            for evidence in &chain.evidence {
                push_node(&mut out, 0, "evidence", evidence);
            }
            out.push('\n');
        }

        if let Some(thesis) = enriched {
            let pros: Vec<&EvidenceItem> = thesis.pros().collect();
            let cons: Vec<&EvidenceItem> = thesis.cons().collect();
            if !pros.is_empty() || !cons.is_empty() {
                out.push_str("### Critical analysis\n");
                push_evidence(&mut out, "Supporting", &pros);
                push_evidence(&mut out, "Contradicting or qualifying", &cons);
            }

            if !thesis.sources.is_empty() {
                out.push_str("### Sources\n");
                for source in &thesis.sources {
                    let tag = if source.has_fulltext() { "full text" } else { "abstract" };
                    let _ = writeln!(
                        out,
                        "- **[{}]({})** ({}, {})",
                        source.title, source.url, source.source_name, tag
                    );
                    if !source.snippet.is_empty() {
                        let _ = writeln!(
                            out,
                            "  > _{}_",
                            crate::prompts::truncate_chars(&source.snippet, SNIPPET_PREVIEW_CHARS)
                        );
                    }
                }
                out.push('\n');
            }
        }

        out.push_str("---\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Polarity, ReasoningChain, Role};

    fn node(text: &str) -> ChainNode {
        ChainNode {
            claim_id: 0,
            role: Role::Thesis,
            text: text.into(),
            pivot_text: text.into(),
            stance: Stance::Affirmative,
            segment_index: 0,
            role_confidence: 0.9,
            reclassified: None,
        }
    }

    fn structure() -> ArgumentStructure {
        ArgumentStructure {
            chains: vec![ReasoningChain {
                chain_id: 0,
                thesis: node("Coffee reduces liver cancer risk"),
                sub_arguments: Vec::new(),
                counter_arguments: Vec::new(),
                evidence: Vec::new(),
            }],
            source_language: "en".into(),
            pivot_language: "en".into(),
            total_claims: 1,
            reclassified_count: 0,
        }
    }

    fn thesis(reliability: Reliability, evidence: Vec<EvidenceItem>) -> EnrichedThesis {
        EnrichedThesis {
            chain_id: 0,
            thesis: node("Coffee reduces liver cancer risk"),
            categories: vec!["medicine".into()],
            sources: Vec::new(),
            evidence,
            reliability,
            agent_reports: Vec::new(),
        }
    }

    #[test]
    fn test_unverifiable_rendered_distinctly() {
        let report = render_report(
            "vid",
            AnalysisMode::Balanced,
            &structure(),
            &[thesis(Reliability::Unverifiable, Vec::new())],
            Utc::now(),
        );
        assert!(report.contains("UNVERIFIABLE"));
        assert!(!report.contains("0.00/1.00"));
    }

    #[test]
    fn test_low_score_is_not_unverifiable() {
        let evidence = vec![EvidenceItem {
            claim_text: "No association found".into(),
            source_url: "https://a".into(),
            polarity: Polarity::Con,
        }];
        let reliability = Reliability::Scored {
            score: 0.0,
            pro_count: 0,
            con_count: 1,
        };
        let report = render_report("vid", AnalysisMode::Deep, &structure(), &[thesis(reliability, evidence)], Utc::now());
        assert!(report.contains("low (0.00/1.00"));
        assert!(!report.contains("UNVERIFIABLE"));
        assert!(report.contains("No association found ([source](https://a))"));
    }

    #[test]
    fn test_empty_structure() {
        let empty = ArgumentStructure::empty("fr", "en");
        let report = render_report("vid", AnalysisMode::Shallow, &empty, &[], Utc::now());
        assert!(report.contains("No arguments were extracted"));
    }
}
