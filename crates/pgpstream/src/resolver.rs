//! Recipient key resolution.

use pgpstream_core::{select_encryption_key, CoreError, PublicKey};
use std::fs::File;
use std::io::BufReader;

use crate::config::EncoderConfig;
use crate::error::{EncoderError, Result};

/// Read the configured key ring and select the recipient key.
///
/// The ring is parsed, searched and dropped; only the selected key survives.
pub fn resolve_key(config: &EncoderConfig) -> Result<PublicKey> {
    let path = &config.public_key_ring;
    let key_ring_error = |source: CoreError| EncoderError::KeyRing {
        path: path.clone(),
        source,
    };

    let file = File::open(path).map_err(|e| key_ring_error(CoreError::Io(e)))?;
    let key = select_encryption_key(BufReader::new(file), &config.key_name)
        .map_err(key_ring_error)?;

    tracing::info!(
        path = %path.display(),
        key_name = %config.key_name,
        fingerprint = %key.fingerprint(),
        algorithm = ?key.algorithm(),
        "resolved recipient key"
    );
    Ok(key)
}
