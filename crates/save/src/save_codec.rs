// ---------------------------------------------------------------------------
// Session snapshot encoding
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;

use bitcode::{Decode, Encode};

use crate::file_header::{unwrap_header, wrap_with_header, FLAG_COMPRESSED};
use crate::save_error::SaveError;

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything the session store keeps: opaque bytes per registered
/// `Saveable`, keyed by its `SAVE_KEY`.
#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct SessionSnapshot {
    pub version: u32,
    /// Session tick the snapshot was taken on.
    pub tick: u64,
    pub extensions: BTreeMap<String, Vec<u8>>,
}

impl SessionSnapshot {
    pub fn new(tick: u64, extensions: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            tick,
            extensions,
        }
    }
}

/// Encode a snapshot into a complete session file: header plus lz4 payload.
pub fn encode_snapshot(snapshot: &SessionSnapshot) -> Result<Vec<u8>, SaveError> {
    let raw = bitcode::encode(snapshot);
    let size = u32::try_from(raw.len())
        .map_err(|_| SaveError::Encode(format!("snapshot too large ({} bytes)", raw.len())))?;
    let compressed = lz4_flex::compress_prepend_size(&raw);
    Ok(wrap_with_header(&compressed, FLAG_COMPRESSED, size))
}

/// Validate and decode a session file.
pub fn decode_snapshot(bytes: &[u8]) -> Result<SessionSnapshot, SaveError> {
    let (header, payload) = unwrap_header(bytes)?;
    let raw = if header.is_compressed() {
        lz4_flex::decompress_size_prepended(payload)?
    } else {
        payload.to_vec()
    };
    if raw.len() != header.uncompressed_size as usize {
        return Err(SaveError::Corrupt(format!(
            "payload is {} bytes, header says {}",
            raw.len(),
            header.uncompressed_size
        )));
    }
    let snapshot: SessionSnapshot = bitcode::decode(&raw)?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(SaveError::VersionMismatch {
            expected_max: SNAPSHOT_VERSION,
            found: snapshot.version,
        });
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SessionSnapshot {
        let mut extensions = BTreeMap::new();
        extensions.insert("cleanup_timers".to_string(), vec![7u8; 300]);
        SessionSnapshot::new(1_234, extensions)
    }

    #[test]
    fn test_snapshot_survives_envelope() {
        let bytes = encode_snapshot(&snapshot()).unwrap();
        assert_eq!(decode_snapshot(&bytes).unwrap(), snapshot());
    }

    #[test]
    fn test_payload_is_compressed() {
        let bytes = encode_snapshot(&snapshot()).unwrap();
        assert!(bytes.len() < 300, "repetitive payload should shrink: {}", bytes.len());
    }

    #[test]
    fn test_newer_snapshot_version_rejected() {
        let mut future = snapshot();
        future.version = SNAPSHOT_VERSION + 1;
        let bytes = encode_snapshot(&future).unwrap();
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(SaveError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_uncompressed_payload_accepted() {
        let raw = bitcode::encode(&snapshot());
        let bytes = wrap_with_header(&raw, 0, raw.len() as u32);
        assert_eq!(decode_snapshot(&bytes).unwrap(), snapshot());
    }

    #[test]
    fn test_size_mismatch_is_corrupt() {
        let raw = bitcode::encode(&snapshot());
        let bytes = wrap_with_header(&raw, 0, raw.len() as u32 + 1);
        assert!(matches!(decode_snapshot(&bytes), Err(SaveError::Corrupt(_))));
    }
}
