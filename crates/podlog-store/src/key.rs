use podlog_model::{Chunk, Source};

/// The store's internal chunk-map key: `(pod_uid, container,
/// source)`. Distinct from [`podlog_model::Chunk::key`], the fuller
/// `(namespace, set_name, pod, pod_uid, container, source)` identity used
/// by the query tier's chunk matcher — a store only ever holds chunks for
/// pods scheduled on its own node, where `pod_uid` alone already
/// disambiguates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub pod_uid: String,
    pub container: String,
    pub source: Source,
}

impl ChunkKey {
    pub fn new(pod_uid: impl Into<String>, container: impl Into<String>, source: Source) -> Self {
        ChunkKey {
            pod_uid: pod_uid.into(),
            container: container.into(),
            source,
        }
    }

    pub fn from_chunk(chunk: &Chunk) -> Self {
        ChunkKey::new(chunk.pod_uid.clone(), chunk.container.clone(), chunk.source.clone())
    }
}

impl std::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.pod_uid, self.container, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_the_three_fields() {
        let key = ChunkKey::new("uid-1", "app", Source::std_stream());
        assert_eq!(key.to_string(), "uid-1_app_std-stream");
    }
}
