//! Evidence analysis, reliability scoring and reporting

pub mod evidence_analyzer;
pub mod reliability;
pub mod report;

pub use evidence_analyzer::{build_corpus, EvidenceAnalyzer};
pub use reliability::{aggregate, stance_adjusted_score};
pub use report::render_report;
