//! Sysfs attribute access.

use std::path::Path;

use anyhow::{Context, Result};

pub async fn read_attr(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file: {:?}", path))
        .map(|s| s.trim().to_string())
}

pub async fn read_int(path: &Path) -> Result<i64> {
    let raw = read_attr(path).await?;
    raw.parse::<i64>()
        .with_context(|| format!("Non-integer value '{}' in {:?}", raw, path))
}

pub async fn write_attr(path: &Path, value: &str) -> Result<()> {
    tokio::fs::write(path, value)
        .await
        .with_context(|| format!("Failed to write to file: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_trimmed_integer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp");
        std::fs::write(&path, "42500\n").unwrap();
        assert_eq!(read_int(&path).await.unwrap(), 42500);
    }

    #[tokio::test]
    async fn garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp");
        std::fs::write(&path, "N/A").unwrap();
        assert!(read_int(&path).await.is_err());
        assert!(read_attr(&dir.path().join("missing")).await.is_err());
    }
}
