//! Reliability aggregation
//!
//! Deterministic reduction of cited evidence to a score in [0, 1]:
//! - affirmative claims need a strongly pro-skewed balance: `r²`
//! - conditional claims are best calibrated near 50/50: 1.0 at `r = 0.5`,
//!   falling to 0.7 when everything is pro and to 0.0 when everything is con
//!
//! where `r` is the pro ratio. No cited evidence means unverifiable.

use crate::types::{EvidenceItem, Polarity, Reliability, Stance};

/// Stance-adjusted score for a pro ratio in [0, 1]
pub fn stance_adjusted_score(pro_ratio: f64, stance: Stance) -> f64 {
    let r = pro_ratio.clamp(0.0, 1.0);
    let score = match stance {
        Stance::Affirmative => r * r,
        Stance::Conditional if r >= 0.5 => 1.0 - (r - 0.5) * 0.6,
        Stance::Conditional => 1.0 - (0.5 - r) * 2.0,
    };
    score.clamp(0.0, 1.0)
}

/// Aggregate evidence for one thesis
///
/// Only items citing a source count; with none the result is
/// [`Reliability::Unverifiable`] whatever the raw counts.
pub fn aggregate(evidence: &[EvidenceItem], stance: Stance) -> Reliability {
    let cited = evidence.iter().filter(|e| !e.source_url.trim().is_empty());
    let (pro_count, con_count) = cited.fold((0, 0), |(p, c), e| match e.polarity {
        Polarity::Pro => (p + 1, c),
        Polarity::Con => (p, c + 1),
    });

    let total = pro_count + con_count;
    if total == 0 {
        return Reliability::Unverifiable;
    }

    Reliability::Scored {
        score: stance_adjusted_score(pro_count as f64 / total as f64, stance),
        pro_count,
        con_count,
    }
}
