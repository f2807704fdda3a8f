use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The verdict mapped from the aggregated score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    /// Score ≤ 3: start over.
    Rewrite,
    /// Score in (3, 5]: restructure substantially.
    Refactor,
    /// Score in (5, 7.5]: build on what exists.
    Enhance,
    /// Score > 7.5: keep as is.
    Maintain,
}

impl Recommendation {
    /// Maps an aggregated score to a recommendation.
    pub fn from_score(score: f64) -> Self {
        if score <= 3.0 {
            Recommendation::Rewrite
        } else if score <= 5.0 {
            Recommendation::Refactor
        } else if score <= 7.5 {
            Recommendation::Enhance
        } else {
            Recommendation::Maintain
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Rewrite => "REWRITE",
            Recommendation::Refactor => "REFACTOR",
            Recommendation::Enhance => "ENHANCE",
            Recommendation::Maintain => "MAINTAIN",
        };
        write!(f, "{s}")
    }
}

/// Fixed section weights. Unknown sections weigh 1.0.
pub fn section_weight(section: &str) -> f64 {
    match section {
        "architecture" => 1.2,
        "security" => 1.5,
        "quality" => 1.0,
        "devops" => 0.8,
        "frontend_code" => 0.5,
        "backend_code" => 0.5,
        _ => 1.0,
    }
}

/// One section's contribution to the aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionScore {
    /// The evaluator's score, 0..=10.
    pub score: f64,
    /// The section's fixed weight.
    pub weight: f64,
}

/// The weighted aggregate over submitted sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Per-section scores and weights.
    pub scores_by_section: BTreeMap<String, SectionScore>,
    /// `Σ(score·weight) / Σ(weight)` over submitted sections only.
    pub aggregated_score: f64,
    /// The mapped verdict.
    pub recommendation: Recommendation,
    /// Concatenated strengths/weaknesses/recommendations across sections.
    pub combined_findings: crate::session::Findings,
    /// The final session state.
    pub session: crate::session::AssessmentSession,
}

/// Computes `Σ(score·weight) / Σ(weight)`. Returns 0 for an empty set.
pub fn weighted_score(sections: &BTreeMap<String, SectionScore>) -> f64 {
    let total_weight: f64 = sections.values().map(|s| s.weight).sum();
    if total_weight == 0.0 {
        return 0.0;
    }
    let weighted: f64 = sections.values().map(|s| s.score * s.weight).sum();
    weighted / total_weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_boundaries() {
        assert_eq!(Recommendation::from_score(0.0), Recommendation::Rewrite);
        assert_eq!(Recommendation::from_score(3.0), Recommendation::Rewrite);
        assert_eq!(Recommendation::from_score(3.01), Recommendation::Refactor);
        assert_eq!(Recommendation::from_score(5.0), Recommendation::Refactor);
        assert_eq!(Recommendation::from_score(5.01), Recommendation::Enhance);
        assert_eq!(Recommendation::from_score(7.5), Recommendation::Enhance);
        assert_eq!(Recommendation::from_score(7.51), Recommendation::Maintain);
        assert_eq!(Recommendation::from_score(10.0), Recommendation::Maintain);
    }

    #[test]
    fn test_section_weights() {
        assert_eq!(section_weight("architecture"), 1.2);
        assert_eq!(section_weight("security"), 1.5);
        assert_eq!(section_weight("quality"), 1.0);
        assert_eq!(section_weight("devops"), 0.8);
        assert_eq!(section_weight("frontend_code"), 0.5);
        assert_eq!(section_weight("backend_code"), 0.5);
        assert_eq!(section_weight("something_else"), 1.0);
    }

    #[test]
    fn test_weighted_score_formula() {
        let mut sections = BTreeMap::new();
        sections.insert(
            "architecture".to_string(),
            SectionScore {
                score: 6.0,
                weight: 1.2,
            },
        );
        sections.insert(
            "security".to_string(),
            SectionScore {
                score: 4.0,
                weight: 1.5,
            },
        );
        sections.insert(
            "quality".to_string(),
            SectionScore {
                score: 5.0,
                weight: 1.0,
            },
        );
        let score = weighted_score(&sections);
        let expected = (6.0 * 1.2 + 4.0 * 1.5 + 5.0 * 1.0) / (1.2 + 1.5 + 1.0);
        assert!((score - expected).abs() < 1e-9);
        assert_eq!(Recommendation::from_score(score), Recommendation::Refactor);
    }

    #[test]
    fn test_empty_sections_score_zero() {
        assert_eq!(weighted_score(&BTreeMap::new()), 0.0);
    }

    #[test]
    fn test_recommendation_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&Recommendation::Refactor).unwrap(),
            "\"REFACTOR\""
        );
    }
}
