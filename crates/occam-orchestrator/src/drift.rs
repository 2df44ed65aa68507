//! # Zero-Drift Gate
//!
//! Compliance content must stay within a cosine-distance threshold of its
//! authoritative source. A [`DriftComparator`] scores the facts in an
//! agent's clause scope and reports the worst one; the orchestrator decides
//! what to do with it.
//!
//! Cosine distance is `1 - cos(a, b)`, in `[0, 2]`. Identical directions
//! score 0, orthogonal vectors 1, opposite vectors 2.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use occam_agents::Fact;
use occam_core::{AgentId, Timestamp};

/// Authoritative version of a clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    pub clause_id: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub content: String,
    pub embedding: Vec<f64>,
}

/// The worst-scoring fact in a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftSample {
    pub clause_id: String,
    pub document_id: String,
    pub score: f64,
    pub source_url: String,
    pub current_content: String,
    pub source_content: String,
}

/// What the gate did about a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriftAction {
    Blocked,
    ReVerificationTriggered,
    Flagged,
}

impl DriftAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::ReVerificationTriggered => "re-verification-triggered",
            Self::Flagged => "flagged",
        }
    }
}

impl std::fmt::Display for DriftAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded drift detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftCase {
    pub clause_id: String,
    pub document_id: String,
    pub agent_id: AgentId,
    pub drift_score: f64,
    pub threshold: f64,
    pub detected_at: Timestamp,
    pub source_url: String,
    pub current_content: String,
    pub source_content: String,
    pub action: DriftAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub re_verification_job_id: Option<String>,
}

impl DriftCase {
    /// At least twice the threshold, or the run was blocked on it.
    pub fn is_critical(&self) -> bool {
        self.action == DriftAction::Blocked || self.drift_score >= 2.0 * self.threshold
    }
}

/// Scores facts against their authoritative sources.
pub trait DriftComparator: Send + Sync {
    /// The highest-scoring fact whose clause is in `clause_scope` (every
    /// fact when the scope is empty), or `None` when nothing can be scored.
    fn worst_sample(&self, factbox: &[Fact], clause_scope: &[String]) -> Option<DriftSample>;
}

/// Cosine distance between two embeddings; `None` for mismatched lengths,
/// empty or zero vectors.
pub fn cosine_distance(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 || !na.is_finite() || !nb.is_finite() {
        return None;
    }
    Some((1.0 - dot / (na * nb)).clamp(0.0, 2.0))
}

/// Compares fact embeddings with authoritative source embeddings, matched
/// by clause id. Facts without a source or embedding are not scored.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingDriftComparator {
    sources: BTreeMap<String, SourceRecord>,
}

impl EmbeddingDriftComparator {
    pub fn new(sources: impl IntoIterator<Item = SourceRecord>) -> Self {
        Self {
            sources: sources
                .into_iter()
                .map(|s| (s.clause_id.clone(), s))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl DriftComparator for EmbeddingDriftComparator {
    fn worst_sample(&self, factbox: &[Fact], clause_scope: &[String]) -> Option<DriftSample> {
        let mut worst: Option<DriftSample> = None;
        for fact in factbox {
            if !clause_scope.is_empty() && !clause_scope.contains(&fact.clause_id) {
                continue;
            }
            let Some(source) = self.sources.get(&fact.clause_id) else {
                continue;
            };
            let Some(score) = cosine_distance(&fact.embedding, &source.embedding) else {
                tracing::debug!(clause_id = %fact.clause_id, fact_id = %fact.id, "fact not scorable");
                continue;
            };
            if worst.as_ref().map_or(true, |w| score > w.score) {
                worst = Some(DriftSample {
                    clause_id: fact.clause_id.clone(),
                    document_id: fact.document_id.clone(),
                    score,
                    source_url: fact
                        .source_url
                        .clone()
                        .unwrap_or_else(|| source.source_url.clone()),
                    current_content: fact.content.clone(),
                    source_content: source.content.clone(),
                });
            }
        }
        worst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(id: &str, clause: &str, embedding: Vec<f64>) -> Fact {
        Fact {
            id: id.into(),
            clause_id: clause.into(),
            document_id: format!("doc-{id}"),
            content: format!("content {id}"),
            embedding,
            source_url: None,
        }
    }

    fn source(clause: &str, embedding: Vec<f64>) -> SourceRecord {
        SourceRecord {
            clause_id: clause.into(),
            source_url: format!("https://regulator.example/{clause}"),
            content: format!("authoritative {clause}"),
            embedding,
        }
    }

    #[test]
    fn distance_values() {
        assert_eq!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]), Some(0.0));
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_distance(&[], &[]), None);
    }

    #[test]
    fn worst_sample_picks_highest_score() {
        let cmp = EmbeddingDriftComparator::new([
            source("c1", vec![1.0, 0.0]),
            source("c2", vec![1.0, 0.0]),
        ]);
        let facts = vec![fact("a", "c1", vec![1.0, 0.1]), fact("b", "c2", vec![0.0, 1.0])];
        let worst = cmp.worst_sample(&facts, &[]).unwrap();
        assert_eq!(worst.clause_id, "c2");
        assert_eq!(worst.source_url, "https://regulator.example/c2");
        assert_eq!(worst.source_content, "authoritative c2");
    }

    #[test]
    fn scope_restricts_clauses() {
        let cmp = EmbeddingDriftComparator::new([
            source("c1", vec![1.0, 0.0]),
            source("c2", vec![1.0, 0.0]),
        ]);
        let facts = vec![fact("a", "c1", vec![1.0, 0.0]), fact("b", "c2", vec![0.0, 1.0])];
        let worst = cmp.worst_sample(&facts, &["c1".to_string()]).unwrap();
        assert_eq!(worst.clause_id, "c1");
        assert_eq!(worst.score, 0.0);
    }

    #[test]
    fn unsourced_facts_are_not_scored() {
        let cmp = EmbeddingDriftComparator::default();
        assert!(cmp
            .worst_sample(&[fact("a", "c1", vec![1.0])], &[])
            .is_none());
    }

    #[test]
    fn action_wire_names() {
        assert_eq!(
            serde_json::to_string(&DriftAction::ReVerificationTriggered).unwrap(),
            "\"re-verification-triggered\""
        );
    }
}
