//! Debug status writer.
//!
//! Writes operator-visible status records as one file per key in a
//! configured directory, in the style of debugfs. Disabled when no
//! directory is configured; write failures are logged, never fatal.

use std::path::PathBuf;

use tracing::warn;

/// Writes `<dir>/<key>` files holding the latest value for each key.
#[derive(Debug, Clone)]
pub struct DebugStatusWriter {
    dir: Option<PathBuf>,
}

impl DebugStatusWriter {
    /// Create a writer rooted at `dir`, creating the directory if needed.
    pub fn new(dir: PathBuf) -> Self {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "cannot create debug status dir");
            return Self { dir: None };
        }
        Self { dir: Some(dir) }
    }

    /// Create a writer that discards all records.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Record `key = value`.
    pub fn record(&self, key: &str, value: &str) {
        let Some(dir) = &self.dir else {
            return;
        };
        if let Err(e) = std::fs::write(dir.join(key), value) {
            warn!(key, error = %e, "failed to write debug status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_latest_value_per_key() {
        let dir = std::env::temp_dir().join(format!("meshd-debugfs-{}", std::process::id()));
        let writer = DebugStatusWriter::new(dir.clone());

        writer.record("is_gateway", "true");
        assert_eq!(
            std::fs::read_to_string(dir.join("is_gateway")).unwrap(),
            "true"
        );

        writer.record("is_gateway", "false");
        assert_eq!(
            std::fs::read_to_string(dir.join("is_gateway")).unwrap(),
            "false"
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn disabled_writer_is_silent() {
        DebugStatusWriter::disabled().record("is_gateway", "true");
    }
}
