//! Loads the warehouse schema description served to the prompt builder.
//!
//! The schema is an opaque text file. It is read once at startup; the
//! fingerprint ties log lines to the schema revision that produced a prompt.

use crate::domain::error::{AppError, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_SCHEMA_PATH: &str = "data/prompt/schema.yaml";

#[derive(Debug, Clone)]
pub struct SchemaDescription {
    pub text: String,
    pub fingerprint: String,
    pub path: PathBuf,
}

pub fn load_schema(path: &Path) -> Result<SchemaDescription> {
    let text = fs::read_to_string(path).map_err(|e| {
        AppError::ConfigError(format!("Failed to read schema {}: {e}", path.display()))
    })?;

    let fingerprint = sha256_hex(text.as_bytes());
    info!(
        path = %path.display(),
        fingerprint = %fingerprint,
        chars = text.len(),
        "Schema loaded"
    );

    Ok(SchemaDescription {
        text,
        fingerprint,
        path: path.to_path_buf(),
    })
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_load_schema_reads_text_and_fingerprint() {
        let path = std::env::temp_dir().join(format!("schema-test-{}.yaml", Uuid::new_v4()));
        fs::write(&path, "abc").unwrap();

        let schema = load_schema(&path).unwrap();

        assert_eq!(schema.text, "abc");
        assert_eq!(
            schema.fingerprint,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_missing_schema_is_config_error() {
        let path = std::env::temp_dir().join(format!("schema-missing-{}.yaml", Uuid::new_v4()));

        assert!(matches!(
            load_schema(&path),
            Err(AppError::ConfigError(_))
        ));
    }
}
