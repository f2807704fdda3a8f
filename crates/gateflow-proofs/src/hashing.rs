use gateflow_core::GateflowResult;
use sha2::{Digest, Sha256};
use std::path::Path;

/// SHA-256 over a byte slice, rendered as lowercase hex.
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 over a file's bytes, rendered as lowercase hex.
pub async fn sha256_file(path: impl AsRef<Path>) -> GateflowResult<String> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    Ok(sha256_bytes(&bytes))
}
