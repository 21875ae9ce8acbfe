//! Cache key derivation.
//!
//! Keys look like `{namespace}:{statistic}:{partition}:{digest}` where the
//! digest is the SHA-256 of the query's canonical JSON. The partition is
//! written in clear so entries for `upcoming` and `past` can never share a
//! key, and so operators can scan one partition by pattern.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::filters::StatsQuery;

#[derive(Debug, Error)]
#[error("failed to encode statistics query: {0}")]
pub struct KeyError(#[from] serde_json::Error);

/// Derive the cache key for a validated query.
///
/// Restrictions are built from ordered maps and sets, so logically equal
/// filter sets serialize to the same bytes regardless of insertion order.
pub fn derive_key(namespace: &str, query: &StatsQuery) -> Result<String, KeyError> {
    let canonical = serde_json::to_vec(query)?;
    let digest = Sha256::digest(&canonical);
    Ok(format!(
        "{namespace}:{}:{}:{}",
        query.statistic.as_str(),
        query.partition.as_str(),
        hex::encode(digest)
    ))
}

/// Prefix matching every key in `namespace`.
pub fn namespace_prefix(namespace: &str) -> String {
    format!("{namespace}:")
}
