//! Evidence sessions: one timestamped directory per run.
//!
//! Artifacts are written atomically (temp file in the same directory, then
//! rename), so a reader never observes a partially written file. Names are
//! always relative to the session directory.

use crate::driver::PageDriver;
use crate::result::{SiteCheckError, SiteCheckResult};
use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Directory name format, local time to the second
pub const SESSION_DIR_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Default evidence root relative to the working directory
pub const DEFAULT_EVIDENCE_ROOT: &str = "evidence";

/// Per-run output directory
#[derive(Debug, Clone)]
pub struct EvidenceSession {
    dir: PathBuf,
    artifacts: Vec<String>,
}

impl EvidenceSession {
    /// Create (or reuse) `<root>/<YYYYMMDD-HHMMSS>` for `timestamp`
    pub fn open(root: &Path, timestamp: DateTime<Local>) -> SiteCheckResult<Self> {
        let dir = root.join(timestamp.format(SESSION_DIR_FORMAT).to_string());
        fs::create_dir_all(&dir).map_err(|e| persistence_failure(&dir, &e))?;
        debug!(dir = %dir.display(), "evidence session ready");
        Ok(Self {
            dir,
            artifacts: Vec::new(),
        })
    }

    /// Open a session stamped with the current local time
    pub fn open_now(root: &Path) -> SiteCheckResult<Self> {
        Self::open(root, Local::now())
    }

    /// Session directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names written so far, in write order (rewrites are listed once)
    #[must_use]
    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    /// Resolve `name` inside the session directory
    pub fn path_for(&self, name: &str) -> SiteCheckResult<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if name.trim().is_empty() || relative.is_absolute() || escapes {
            return Err(SiteCheckError::EvidencePersistenceFailure {
                path: name.to_string(),
                message: "artifact names must stay inside the session directory".to_string(),
            });
        }
        Ok(self.dir.join(relative))
    }

    /// Write raw bytes atomically
    pub fn save_bytes(&mut self, name: &str, contents: &[u8]) -> SiteCheckResult<PathBuf> {
        let path = self.path_for(name)?;
        atomic_write(&path, contents).map_err(|e| persistence_failure(&path, &e))?;
        if !self.artifacts.iter().any(|a| a == name) {
            self.artifacts.push(name.to_string());
        }
        debug!(artifact = name, bytes = contents.len(), "evidence written");
        Ok(path)
    }

    /// Write `value` as indented UTF-8 JSON, non-ASCII kept verbatim
    pub fn save_json<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
    ) -> SiteCheckResult<PathBuf> {
        let mut json = serde_json::to_string_pretty(value)?;
        json.push('\n');
        self.save_bytes(name, json.as_bytes())
    }

    /// Capture the full page from `driver` as PNG
    pub async fn save_screenshot<D>(&mut self, driver: &D, name: &str) -> SiteCheckResult<PathBuf>
    where
        D: PageDriver + ?Sized,
    {
        // Validate before the capture so a bad name costs no browser round trip.
        self.path_for(name)?;
        let png = driver.screenshot_full_page().await?;
        self.save_bytes(name, &png)
    }

    /// Read back a JSON artifact
    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> SiteCheckResult<T> {
        let path = self.path_for(name)?;
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn persistence_failure(path: &Path, err: &std::io::Error) -> SiteCheckError {
    SiteCheckError::EvidencePersistenceFailure {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.as_file_mut().sync_all()?;
    temp.into_temp_path().persist(path).map_err(|e| e.error)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn stamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, 12, 0, 5).unwrap()
    }

    // =========================================================================
    // Session directory
    // =========================================================================

    #[test]
    fn h0_evidence_01_open_creates_timestamped_dir() {
        let root = tempfile::tempdir().unwrap();
        let session = EvidenceSession::open(root.path(), stamp()).unwrap();
        assert_eq!(session.dir(), root.path().join("20260314-120005"));
        assert!(session.dir().is_dir());
        assert!(session.artifacts().is_empty());
    }

    #[test]
    fn h0_evidence_02_open_reuses_existing_dir() {
        let root = tempfile::tempdir().unwrap();
        let mut first = EvidenceSession::open(root.path(), stamp()).unwrap();
        first.save_json("a.json", &json!({"x": 1})).unwrap();
        let second = EvidenceSession::open(root.path(), stamp()).unwrap();
        assert!(second.dir().join("a.json").exists());
    }

    #[test]
    fn h0_evidence_03_open_fails_when_root_is_a_file() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("evidence");
        fs::write(&blocker, b"not a directory").unwrap();
        let err = EvidenceSession::open(&blocker, stamp()).unwrap_err();
        assert!(matches!(
            err,
            SiteCheckError::EvidencePersistenceFailure { .. }
        ));
    }

    // =========================================================================
    // JSON artifacts
    // =========================================================================

    #[test]
    fn h0_evidence_04_json_is_indented_and_keeps_non_ascii() {
        let root = tempfile::tempdir().unwrap();
        let mut session = EvidenceSession::open(root.path(), stamp()).unwrap();
        let path = session
            .save_json("dialog_messages.json", &json!({"dialogs": ["暂未开放"]}))
            .unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("暂未开放"));
        assert!(text.contains("\n  \"dialogs\""));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn h0_evidence_05_last_write_wins() {
        let root = tempfile::tempdir().unwrap();
        let mut session = EvidenceSession::open(root.path(), stamp()).unwrap();
        session.save_json("url_snapshots.json", &json!({"v": 1})).unwrap();
        session.save_json("url_snapshots.json", &json!({"v": 2})).unwrap();
        let value: serde_json::Value = session.read_json("url_snapshots.json").unwrap();
        assert_eq!(value, json!({"v": 2}));
        assert_eq!(session.artifacts(), ["url_snapshots.json".to_string()]);
    }

    #[test]
    fn h0_evidence_06_no_temp_files_left_behind() {
        let root = tempfile::tempdir().unwrap();
        let mut session = EvidenceSession::open(root.path(), stamp()).unwrap();
        session.save_bytes("shot.png", &[0x89, b'P', b'N', b'G']).unwrap();
        let names: Vec<_> = fs::read_dir(session.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["shot.png".to_string()]);
    }

    #[test]
    fn h0_evidence_07_nested_names_create_subdirs() {
        let root = tempfile::tempdir().unwrap();
        let mut session = EvidenceSession::open(root.path(), stamp()).unwrap();
        session.save_json("snapshots/state.json", &json!([])).unwrap();
        assert!(session.dir().join("snapshots").join("state.json").exists());
    }

    // =========================================================================
    // Name validation
    // =========================================================================

    #[test]
    fn h0_evidence_08_rejects_traversal() {
        let root = tempfile::tempdir().unwrap();
        let mut session = EvidenceSession::open(root.path(), stamp()).unwrap();
        assert!(session.save_json("../escape.json", &json!({})).is_err());
        assert!(session.save_json("a/../../escape.json", &json!({})).is_err());
        assert!(session.save_json("/tmp/abs.json", &json!({})).is_err());
        assert!(session.save_json("  ", &json!({})).is_err());
        assert!(!root.path().join("escape.json").exists());
    }
}
