mod checksum;
mod public_key;

pub use checksum::{sha256_file_hex, sha256_hex};
pub use public_key::parse_ed25519_public_key_hex;
