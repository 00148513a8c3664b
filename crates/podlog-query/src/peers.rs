//! Peer-address resolution for the query shard's fan-out and the global
//! querier's cluster table.
//!
//! DNS SRV lookups of `{lookupServicePrefix}-{i}` would be the fuller
//! answer here, but the workspace carries no DNS-resolver crate for it, so
//! this is implemented as plain A/AAAA resolution of each ordinal
//! hostname via `tokio::net::lookup_host` rather than pulling in a new
//! dependency for SRV-record parsing the caller doesn't otherwise need —
//! documented as a redesign in DESIGN.md. Resolution happens once at
//! startup and is cached for the process lifetime.

use tokio::net::lookup_host;

/// Resolves `{prefix}-0 .. {prefix}-(count-1)`, each on `port`, skipping any
/// hostname that doesn't resolve (a peer not yet scheduled, or this
/// shard's own ordinal). Returns `host:port` strings suitable for HTTP
/// dialing.
pub async fn resolve_ordinals(prefix: &str, count: usize, port: u16) -> Vec<String> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let host = format!("{prefix}-{i}");
        let lookup_target = format!("{host}:{port}");
        match lookup_host(&lookup_target).await {
            Ok(mut addrs) => {
                if let Some(addr) = addrs.next() {
                    out.push(addr.to_string());
                } else {
                    tracing::debug!(host, "ordinal resolved to no addresses");
                }
            }
            Err(e) => {
                tracing::debug!(host, error = %e, "ordinal did not resolve, skipping");
            }
        }
    }
    out
}

/// Resolves every `(cluster, host:port)` pair's host, dropping clusters
/// whose address can't be resolved.
pub async fn resolve_clusters(clusters: &[(String, String)]) -> Vec<crate::broker::Endpoint> {
    let mut out = Vec::with_capacity(clusters.len());
    for (cluster, addr) in clusters {
        match lookup_host(addr).await {
            Ok(mut addrs) if addrs.next().is_some() => out.push(crate::broker::Endpoint {
                cluster: cluster.clone(),
                addr: addr.clone(),
            }),
            Ok(_) => tracing::warn!(cluster, addr, "cluster address resolved to no addresses, skipping"),
            Err(e) => tracing::warn!(cluster, addr, error = %e, "cluster address did not resolve, skipping"),
        }
    }
    out
}

/// `hash(ip) mod modulus` sharding used by both the push-accept middleware
/// (which shard keeps a given `X-Real-IP`) and the query shard's own
/// peer-routing decision for a fan-out request.
pub fn shard_of(key: &str, modulus: u32) -> u32 {
    if modulus == 0 {
        return 0;
    }
    let mut hash: u32 = 2166136261; // FNV-1a offset basis
    for b in key.as_bytes() {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash % modulus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_of_is_stable_for_the_same_key() {
        let a = shard_of("10.0.0.1", 4);
        let b = shard_of("10.0.0.1", 4);
        assert_eq!(a, b);
        assert!(a < 4);
    }

    #[test]
    fn shard_of_zero_modulus_is_always_zero() {
        assert_eq!(shard_of("anything", 0), 0);
    }
}
