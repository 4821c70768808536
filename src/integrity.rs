use once_cell::sync::Lazy;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::identifier::ContentStreamId;

/// Hash of a single event record: stream, version, type, and the canonical
/// JSON payload. Stored on the record at append time; `verify` recomputes it.
pub fn hash_record(
    stream: &ContentStreamId,
    version: u64,
    event_type: &str,
    payload: &Value,
) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(stream.as_str().as_bytes());
    hasher.update(version.to_be_bytes());
    hasher.update(event_type.as_bytes());
    hasher.update(serde_json::to_vec(payload)?);
    Ok(hex::encode(hasher.finalize()))
}

/// Merkle root over a stream's record hashes. An odd trailing hash is
/// promoted unchanged to the next layer.
pub fn merkle_root(hashes: &[String]) -> String {
    if hashes.is_empty() {
        return empty_root().clone();
    }

    let mut layer: Vec<Vec<u8>> = hashes.iter().map(|hash| hash.as_bytes().to_vec()).collect();
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => {
                    let mut hasher = Sha256::new();
                    hasher.update(left);
                    hasher.update(right);
                    hasher.finalize().to_vec()
                }
                [lone] => lone.clone(),
                _ => unreachable!("chunks(2) yields one or two elements"),
            })
            .collect();
    }
    hex::encode(&layer[0])
}

pub fn empty_root() -> &'static String {
    static EMPTY: Lazy<String> = Lazy::new(|| hex::encode(Sha256::digest([])));
    &EMPTY
}
