//! # Report Store
//!
//! Flat directory of `{YYYY-MM-DD}.json` report files. One file per
//! calendar date: a second audit on the same date replaces the first.
//! Writes go through a temporary file and a rename, so readers never see a
//! half-written report.
//!
//! Retention is enforced by [`ReportStore::prune()`], which the audit job
//! never calls on its own.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::Value;

use occam_core::{checksum_of, Timestamp};

use crate::error::AuditError;
use crate::report::ComplianceIntegrityReport;

/// Result of re-hashing a persisted report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportVerification {
    pub path: PathBuf,
    pub recorded: String,
    pub computed: String,
}

impl ReportVerification {
    pub fn is_valid(&self) -> bool {
        self.recorded == self.computed
    }
}

#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a report generated on `date` is written to.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// Persist a sealed report at the path for its generation date.
    pub fn write(&self, report: &ComplianceIntegrityReport) -> Result<PathBuf, AuditError> {
        if report.checksum.is_none() {
            return Err(AuditError::InvalidReport {
                path: self.path_for(report.generated_at.date()),
                reason: "report is not sealed".into(),
            });
        }
        fs::create_dir_all(&self.dir).map_err(|e| AuditError::persistence(&self.dir, e))?;

        let path = self.path_for(report.generated_at.date());
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(report)?;
        fs::write(&tmp, body).map_err(|e| AuditError::persistence(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &path) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                tracing::warn!(path = %tmp.display(), error = %cleanup, "temporary report not removed");
            }
            return Err(AuditError::persistence(&path, e));
        }
        tracing::debug!(path = %path.display(), "report written");
        Ok(path)
    }

    pub fn read(&self, path: &Path) -> Result<ComplianceIntegrityReport, AuditError> {
        let raw = fs::read(path).map_err(|e| AuditError::persistence(path, e))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Re-hash a report file's body without its `checksum` field and
    /// compare with the recorded value. Works on any path, not only files
    /// inside this store.
    pub fn verify(path: &Path) -> Result<ReportVerification, AuditError> {
        let raw = fs::read(path).map_err(|e| AuditError::persistence(path, e))?;
        let mut body: Value = serde_json::from_slice(&raw)?;
        let recorded = body
            .as_object_mut()
            .and_then(|obj| obj.remove("checksum"))
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or_else(|| AuditError::InvalidReport {
                path: path.to_path_buf(),
                reason: "no checksum field".into(),
            })?;
        let computed = checksum_of(&body)?;
        Ok(ReportVerification {
            path: path.to_path_buf(),
            recorded,
            computed,
        })
    }

    /// Dated report files, oldest first. Other files are ignored.
    pub fn list(&self) -> Result<Vec<(NaiveDate, PathBuf)>, AuditError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AuditError::persistence(&self.dir, e)),
        };
        let mut out = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| AuditError::persistence(&self.dir, e))?.path();
            if let Some(date) = report_date(&path) {
                out.push((date, path));
            }
        }
        out.sort();
        Ok(out)
    }

    /// The most recent report file, if any.
    pub fn latest(&self) -> Result<Option<PathBuf>, AuditError> {
        Ok(self.list()?.pop().map(|(_, p)| p))
    }

    /// Delete dated reports older than `retention_days` before `now`.
    /// Returns the removed paths.
    pub fn prune(&self, retention_days: u32, now: Timestamp) -> Result<Vec<PathBuf>, AuditError> {
        let cutoff = now.date() - Duration::days(i64::from(retention_days));
        let mut removed = Vec::new();
        for (date, path) in self.list()? {
            if date < cutoff {
                fs::remove_file(&path).map_err(|e| AuditError::persistence(&path, e))?;
                tracing::info!(path = %path.display(), %date, "expired report removed");
                removed.push(path);
            }
        }
        Ok(removed)
    }
}

fn report_date(path: &Path) -> Option<NaiveDate> {
    if path.extension()? != "json" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::{period, run, slo, ts};

    fn sealed(end: &str) -> ComplianceIntegrityReport {
        let mut p = period();
        p.end = ts(end);
        let mut report = ComplianceIntegrityReport::from_run(&run(vec![], vec![]), p, slo(), None);
        report.seal().unwrap();
        report
    }

    #[test]
    fn written_report_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let report = sealed("2026-03-08T00:00:00Z");
        let path = store.write(&report).unwrap();
        assert_eq!(path, dir.path().join("2026-03-08.json"));

        let v = ReportStore::verify(&path).unwrap();
        assert!(v.is_valid());
        assert_eq!(Some(v.recorded), report.checksum);
        assert_eq!(store.read(&path).unwrap(), report);
    }

    #[test]
    fn edited_file_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let path = store.write(&sealed("2026-03-08T00:00:00Z")).unwrap();

        let mut body: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        body["summary"]["verifiedDocuments"] = Value::from(42);
        fs::write(&path, serde_json::to_vec(&body).unwrap()).unwrap();

        assert!(!ReportStore::verify(&path).unwrap().is_valid());
    }

    #[test]
    fn missing_checksum_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2026-03-08.json");
        fs::write(&path, br#"{"id": "x"}"#).unwrap();
        assert!(matches!(
            ReportStore::verify(&path),
            Err(AuditError::InvalidReport { .. })
        ));
    }

    #[test]
    fn unsealed_report_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = sealed("2026-03-08T00:00:00Z");
        report.checksum = None;
        assert!(ReportStore::new(dir.path()).write(&report).is_err());
    }

    #[test]
    fn same_date_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let first = sealed("2026-03-08T00:00:00Z");
        let second = sealed("2026-03-08T18:30:00Z");
        store.write(&first).unwrap();
        let path = store.write(&second).unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.read(&path).unwrap().id, second.id);
    }

    #[test]
    fn failed_rename_leaves_no_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        // A non-empty directory at the target path makes the rename fail.
        let blocker = dir.path().join("2026-03-08.json");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), b"x").unwrap();

        assert!(matches!(
            store.write(&sealed("2026-03-08T00:00:00Z")),
            Err(AuditError::Persistence { .. })
        ));
        assert!(!dir.path().join("2026-03-08.json.tmp").exists());
        assert!(blocker.is_dir());
    }

    #[test]
    fn prune_removes_only_expired_dated_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        for end in [
            "2025-11-01T00:00:00Z",
            "2026-01-02T00:00:00Z",
            "2026-03-08T00:00:00Z",
        ] {
            store.write(&sealed(end)).unwrap();
        }
        fs::write(dir.path().join("notes.json"), b"{}").unwrap();

        let removed = store.prune(90, ts("2026-04-01T00:00:00Z")).unwrap();
        assert_eq!(removed, vec![dir.path().join("2025-11-01.json")]);
        let left: Vec<NaiveDate> = store.list().unwrap().into_iter().map(|(d, _)| d).collect();
        assert_eq!(left.len(), 2);
        assert!(dir.path().join("notes.json").exists());
        assert_eq!(store.latest().unwrap(), Some(dir.path().join("2026-03-08.json")));
    }

    #[test]
    fn missing_directory_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
        assert!(store.prune(1, Timestamp::now()).unwrap().is_empty());
    }
}
