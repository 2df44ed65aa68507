//! # Shared Run Context
//!
//! One [`SharedContext`] per workflow run. The checksummed body is held in
//! an `Arc` and exposed only through shared references, so nothing can
//! mutate it after the checksum is taken. Per-agent results accumulate in
//! the orchestrator's run record beside the context, never inside it.
//!
//! The checksum is the hex SHA-256 of the JCS-canonical JSON of
//! [`ContextBody`]. [`SharedContext::restore()`] re-hydrates a retained body
//! with its stored checksum without recomputing it; a body that diverged
//! from its checksum is caught by [`SharedContext::verify()`] at the next
//! step boundary.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use occam_agents::Fact;
use occam_core::{checksum_of, Timestamp};

use crate::error::WorkflowError;

/// Caller-supplied inputs for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextInputs {
    pub ontology: Value,
    pub factbox: Vec<Fact>,
    pub policy_matrix_version: String,
    /// Name to opaque credential-vault reference.
    pub vault_refs: BTreeMap<String, String>,
    pub regulatory_context: Value,
}

/// The checksummed part of a run context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBody {
    pub ontology_snapshot: Value,
    pub factbox_snapshot: Vec<Fact>,
    pub policy_matrix_version: String,
    pub vault_refs: BTreeMap<String, String>,
    pub regulatory_context: Value,
    pub start_time: Timestamp,
}

impl ContextBody {
    /// Hex SHA-256 of the canonical body.
    pub fn compute_checksum(&self) -> Result<String, WorkflowError> {
        Ok(checksum_of(self)?)
    }
}

/// Immutable, checksummed run context.
#[derive(Debug, Clone)]
pub struct SharedContext {
    body: Arc<ContextBody>,
    checksum: String,
}

impl SharedContext {
    /// Snapshot `inputs` at `start_time` and checksum the result.
    ///
    /// # Errors
    ///
    /// `Configuration` if `policy_matrix_version` is not a semantic version.
    pub fn build(inputs: ContextInputs, start_time: Timestamp) -> Result<Self, WorkflowError> {
        if !is_semver(&inputs.policy_matrix_version) {
            return Err(WorkflowError::Configuration(format!(
                "policy matrix version is not a semantic version: {:?}",
                inputs.policy_matrix_version
            )));
        }
        let body = ContextBody {
            ontology_snapshot: inputs.ontology,
            factbox_snapshot: inputs.factbox,
            policy_matrix_version: inputs.policy_matrix_version,
            vault_refs: inputs.vault_refs,
            regulatory_context: inputs.regulatory_context,
            start_time,
        };
        let checksum = body.compute_checksum()?;
        Ok(Self {
            body: Arc::new(body),
            checksum,
        })
    }

    /// Re-hydrate a retained context. The checksum is taken as given.
    pub fn restore(body: ContextBody, checksum: impl Into<String>) -> Self {
        Self {
            body: Arc::new(body),
            checksum: checksum.into(),
        }
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn body(&self) -> &ContextBody {
        &self.body
    }

    pub fn ontology(&self) -> &Value {
        &self.body.ontology_snapshot
    }

    pub fn factbox(&self) -> &[Fact] {
        &self.body.factbox_snapshot
    }

    pub fn policy_matrix_version(&self) -> &str {
        &self.body.policy_matrix_version
    }

    pub fn vault_refs(&self) -> &BTreeMap<String, String> {
        &self.body.vault_refs
    }

    pub fn regulatory_context(&self) -> &Value {
        &self.body.regulatory_context
    }

    pub fn start_time(&self) -> Timestamp {
        self.body.start_time
    }

    /// Recompute the checksum and compare it with the stored one.
    pub fn verify(&self) -> Result<(), WorkflowError> {
        let actual = self.body.compute_checksum()?;
        if actual != self.checksum {
            return Err(WorkflowError::ChecksumMismatch {
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// `MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]`, numeric parts without leading
/// zeros.
pub fn is_semver(s: &str) -> bool {
    let (rest, build) = match s.split_once('+') {
        Some((r, b)) => (r, Some(b)),
        None => (s, None),
    };
    let (core, pre) = match rest.split_once('-') {
        Some((c, p)) => (c, Some(p)),
        None => (rest, None),
    };

    let numeric = |p: &str| {
        !p.is_empty()
            && p.chars().all(|c| c.is_ascii_digit())
            && (p == "0" || !p.starts_with('0'))
    };
    let ident_list = |list: &str| {
        list.split('.').all(|id| {
            !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
    };

    let parts: Vec<&str> = core.split('.').collect();
    parts.len() == 3
        && parts.iter().all(|p| numeric(p))
        && pre.map_or(true, ident_list)
        && build.map_or(true, ident_list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs() -> ContextInputs {
        ContextInputs {
            ontology: json!({"policies": ["aml"]}),
            factbox: vec![Fact {
                id: "f1".into(),
                clause_id: "c1".into(),
                document_id: "d1".into(),
                content: "Verify customer identity".into(),
                embedding: vec![1.0, 0.0],
                source_url: None,
            }],
            policy_matrix_version: "2.1.0".into(),
            vault_refs: BTreeMap::from([("kyc".to_string(), "vault://kyc/api".to_string())]),
            regulatory_context: json!({"jurisdiction": "EU"}),
        }
    }

    fn start() -> Timestamp {
        Timestamp::parse("2026-03-01T09:00:00Z").unwrap()
    }

    #[test]
    fn fresh_context_verifies() {
        let ctx = SharedContext::build(inputs(), start()).unwrap();
        assert_eq!(ctx.checksum().len(), 64);
        assert!(ctx.verify().is_ok());
        assert_eq!(ctx.body().compute_checksum().unwrap(), ctx.checksum());
    }

    #[test]
    fn checksum_is_deterministic() {
        let a = SharedContext::build(inputs(), start()).unwrap();
        let b = SharedContext::build(inputs(), start()).unwrap();
        assert_eq!(a.checksum(), b.checksum());
    }

    #[test]
    fn start_time_is_covered() {
        let a = SharedContext::build(inputs(), start()).unwrap();
        let later = Timestamp::parse("2026-03-01T09:00:01Z").unwrap();
        let b = SharedContext::build(inputs(), later).unwrap();
        assert_ne!(a.checksum(), b.checksum());
    }

    #[test]
    fn tampered_restore_fails_verification() {
        let ctx = SharedContext::build(inputs(), start()).unwrap();
        let mut body = ctx.body().clone();
        body.factbox_snapshot[0].content = "Identity checks optional".into();
        let tampered = SharedContext::restore(body, ctx.checksum());
        match tampered.verify() {
            Err(WorkflowError::ChecksumMismatch { expected, actual }) => {
                assert_eq!(expected, ctx.checksum());
                assert_ne!(actual, expected);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn clones_share_the_body() {
        let ctx = SharedContext::build(inputs(), start()).unwrap();
        let clone = ctx.clone();
        assert!(std::ptr::eq(ctx.body(), clone.body()));
    }

    #[test]
    fn invalid_version_rejected() {
        let mut i = inputs();
        i.policy_matrix_version = "v2".into();
        assert!(matches!(
            SharedContext::build(i, start()),
            Err(WorkflowError::Configuration(_))
        ));
    }

    #[test]
    fn semver_forms() {
        for ok in ["0.0.0", "1.2.3", "10.20.30", "1.0.0-rc.1", "1.0.0+build.5", "1.0.0-alpha-1+sha.abc"] {
            assert!(is_semver(ok), "{ok}");
        }
        for bad in ["", "1", "1.2", "1.2.3.4", "01.2.3", "1.2.x", "1.2.3-", "1.2.3+", "1.2.3-a..b"] {
            assert!(!is_semver(bad), "{bad}");
        }
    }

    #[test]
    fn inputs_deserialize_from_camel_case() {
        let i: ContextInputs = serde_json::from_value(json!({
            "policyMatrixVersion": "1.0.0",
            "factbox": [{"id": "f", "clauseId": "c", "documentId": "d", "content": "x"}],
            "vaultRefs": {"a": "b"}
        }))
        .unwrap();
        assert_eq!(i.factbox[0].clause_id, "c");
        assert_eq!(i.ontology, Value::Null);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn numeric_triples_are_semver(a in 0u32..10_000, b in 0u32..10_000, c in 0u32..10_000) {
                let version = format!("{}.{}.{}", a, b, c);
                prop_assert!(is_semver(&version));
            }

            #[test]
            fn any_content_change_breaks_verification(content in "[a-zA-Z0-9 ]{1,40}") {
                let ctx = SharedContext::build(inputs(), start()).unwrap();
                let mut body = ctx.body().clone();
                prop_assume!(body.factbox_snapshot[0].content != content);
                body.factbox_snapshot[0].content = content;
                let restored = SharedContext::restore(body, ctx.checksum());
                prop_assert!(restored.verify().is_err());
            }
        }
    }
}
