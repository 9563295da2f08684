//! Request fingerprinting for log correlation
//!
//! Fingerprints identify a request in `tracing` output across playback,
//! recording and misses. They never take part in matching.

use sha2::{Digest, Sha256};

use crate::interaction::Request;

/// Compute SHA-256 fingerprint of a request
///
/// The fingerprint includes:
/// 1. Method
/// 2. Normalized URI
/// 3. Headers (lowercase names, sorted, trimmed values)
/// 4. Body
#[must_use]
pub fn fingerprint_request(request: &Request) -> [u8; 32] {
    let mut hasher = Sha256::new();

    // 1. Method
    let method = request.method().as_str();
    hasher.update((method.len() as u32).to_le_bytes());
    hasher.update(method.as_bytes());

    // 2. URI (already normalized at construction)
    let uri = request.uri();
    hasher.update((uri.len() as u32).to_le_bytes());
    hasher.update(uri.as_bytes());

    // 3. Headers
    let mut headers: Vec<(String, &str)> = request
        .headers()
        .iter()
        .flat_map(|(name, values)| {
            let name = name.to_lowercase();
            values.iter().map(move |value| (name.clone(), value.trim()))
        })
        .collect();
    headers.sort_unstable();
    for (name, value) in &headers {
        hasher.update((name.len() as u32).to_le_bytes());
        hasher.update(name.as_bytes());
        hasher.update((value.len() as u32).to_le_bytes());
        hasher.update(value.as_bytes());
    }

    // 4. Body
    hasher.update((request.body().len() as u32).to_le_bytes());
    hasher.update(request.body());

    hasher.finalize().into()
}

/// Short hex form of a request fingerprint (first 8 bytes)
#[must_use]
pub fn short_fingerprint(request: &Request) -> String {
    hex::encode(&fingerprint_request(request)[..8])
}
