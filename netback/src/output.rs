//! Artifact persistence: one file per device under `<root>/<group>/<name>`.

use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::config::Device;
use crate::error::OutputError;

/// Writes filtered device text below an output root.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the output root. Called once before any device is contacted.
    pub async fn ensure_root(&self) -> Result<(), OutputError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| OutputError::CreateDir {
                path: self.root.clone(),
                source,
            })
    }

    /// Where `device`'s artifact goes.
    pub fn path_for(&self, device: &Device) -> Result<PathBuf, OutputError> {
        let group = single_component(&device.group)?;
        let name = single_component(&device.name)?;
        Ok(self.root.join(group).join(name))
    }

    /// Write `text` for `device`, creating the group directory as needed.
    pub async fn write(&self, device: &Device, text: &str) -> Result<PathBuf, OutputError> {
        let path = self.path_for(device)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| OutputError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&path, text)
            .await
            .map_err(|source| OutputError::Write {
                path: path.clone(),
                source,
            })?;
        debug!("wrote {} bytes to {}", text.len(), path.display());
        Ok(path)
    }
}

/// Accept only a plain, relative, single-level path segment.
fn single_component(value: &str) -> Result<&Path, OutputError> {
    let path = Path::new(value);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        _ => Err(OutputError::InvalidComponent(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, group: &str) -> Device {
        Device::new(name, "10.0.0.1", "ios", group)
    }

    #[tokio::test]
    async fn test_write_creates_group_dir() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path().join("configs"));
        writer.ensure_root().await.unwrap();

        let path = writer.write(&device("r1", "core"), "hostname r1\n").await.unwrap();

        assert_eq!(path, dir.path().join("configs").join("core").join("r1"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hostname r1\n");
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        let d = device("r1", "core");

        writer.write(&d, "old").await.unwrap();
        let path = writer.write(&d, "new").await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "new");
    }

    #[test]
    fn test_rejects_escaping_components() {
        let writer = OutputWriter::new("/tmp/out");
        for (name, group) in [("", "core"), ("r1", ""), ("..", "core"), ("r1", "../etc"), ("a/b", "core"), ("r1", "/abs")] {
            let err = writer.path_for(&device(name, group)).unwrap_err();
            assert!(matches!(err, OutputError::InvalidComponent(_)), "{name:?} {group:?}");
        }
        assert!(writer.path_for(&device("r1.example.net", "dc-1")).is_ok());
    }

    #[tokio::test]
    async fn test_write_failure_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the group directory should be.
        std::fs::write(dir.path().join("core"), "").unwrap();
        let writer = OutputWriter::new(dir.path());

        let err = writer.write(&device("r1", "core"), "x").await.unwrap_err();
        assert!(matches!(err, OutputError::CreateDir { .. }));
    }
}
