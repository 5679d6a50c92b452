use anyhow::{Context, Result};
use ed25519_dalek::VerifyingKey;

/// Decodes and validates the Ed25519 key used to check signed update packages.
pub fn parse_ed25519_public_key_hex(public_key_hex: &str) -> Result<VerifyingKey> {
    let trimmed = public_key_hex.trim();
    if trimmed.is_empty() {
        anyhow::bail!("public key is empty");
    }

    let public_key_bytes =
        hex::decode(trimmed).context("failed to decode Ed25519 public key hex")?;
    let public_key_len = public_key_bytes.len();
    let public_key_array: [u8; 32] = public_key_bytes.try_into().map_err(|_| {
        anyhow::anyhow!(
            "invalid Ed25519 public key length: expected 32 bytes, got {}",
            public_key_len
        )
    })?;

    VerifyingKey::from_bytes(&public_key_array).context("invalid Ed25519 public key bytes")
}
