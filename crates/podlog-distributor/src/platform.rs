//! The boundary between the distributor and the cluster's pod metadata,
//! kept out of this crate: no Kubernetes client is
//! implemented here. Binaries wire a concrete [`PodProvider`] — typically
//! backed by a watch against the API server or kubelet — in.

use std::collections::BTreeMap;

use async_trait::async_trait;
use podlog_model::Labels;

/// The subset of a pod's metadata the distributor needs to label and
/// address the chunks it discovers for that pod.
#[derive(Debug, Clone)]
pub struct PodInfo {
    pub uid: String,
    pub namespace: String,
    pub name: String,
    pub labels: Labels,
}

/// Supplies the current set of pods scheduled on this node, keyed by UID —
/// the same keying the kubelet uses for its per-pod log and emptydir
/// directories, so the distributor can join discovered files back to the
/// pod they belong to.
#[async_trait]
pub trait PodProvider: Send + Sync {
    async fn get_pods(&self) -> BTreeMap<String, PodInfo>;
}

/// A provider with no pods, useful for tests and for a distributor that
/// relies solely on directory-name parsing (`{ns}_{pod}_{uid}`) rather than
/// live label lookups.
pub struct EmptyPodProvider;

#[async_trait]
impl PodProvider for EmptyPodProvider {
    async fn get_pods(&self) -> BTreeMap<String, PodInfo> {
        BTreeMap::new()
    }
}
