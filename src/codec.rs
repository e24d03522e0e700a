// Snapshot wire format. [version: u8][wincode payload].

use crate::error::{MonitorError, Result};
use crate::models::Snapshot;

/// Current snapshot layout. Bump when a model field is added, removed or reordered.
pub const SNAPSHOT_VERSION: u8 = 2;

fn with_version_prefix(version: u8, payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(version);
    out.extend_from_slice(&payload);
    out
}

/// Version byte of an encoded blob, 0 for empty input.
pub fn blob_version(bytes: &[u8]) -> u8 {
    if bytes.is_empty() { 0 } else { bytes[0] }
}

pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let payload =
        wincode::serialize(snapshot).map_err(|e| MonitorError::Codec(format!("wincode: {}", e)))?;
    Ok(with_version_prefix(SNAPSHOT_VERSION, payload))
}

/// There is no legacy unprefixed layout: anything that does not start
/// with `SNAPSHOT_VERSION` is rejected.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot> {
    match bytes.split_first() {
        None => Err(MonitorError::Codec("empty input".into())),
        Some((&SNAPSHOT_VERSION, payload)) => wincode::deserialize(payload)
            .map_err(|e| MonitorError::Codec(format!("wincode deserialize snapshot: {}", e))),
        Some((version, _)) => Err(MonitorError::Codec(format!(
            "unsupported snapshot version {}",
            version
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(decode_snapshot(&[]), Err(MonitorError::Codec(_))));
        assert_eq!(blob_version(&[]), 0);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = decode_snapshot(&[9, 1, 2, 3]).unwrap_err();
        assert!(err.to_string().contains("version 9"));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        assert!(decode_snapshot(&[SNAPSHOT_VERSION, 1]).is_err());
    }
}
