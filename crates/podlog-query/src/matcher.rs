use std::collections::HashSet;

use podlog_model::Chunk;

use crate::request::Request;

/// Built once per request and applied to every candidate chunk. Every named
/// category matches by AND; an empty category always matches (it wasn't
/// part of the selector). `labels` matches by OR against the chunk's
/// `key=value` pair set — the pair-keyed form is preferred over a
/// substring match, since a substring matcher produces false positives
/// whenever one label's value is a substring of another's.
pub struct ChunkMatcher {
    clusters: HashSet<String>,
    namespaces: HashSet<String>,
    set_names: HashSet<String>,
    pods: HashSet<String>,
    containers: HashSet<String>,
    sources: HashSet<String>,
    labels: HashSet<String>,
}

fn set_of(values: &[String]) -> HashSet<String> {
    values.iter().cloned().collect()
}

impl ChunkMatcher {
    pub fn new(req: &Request) -> Self {
        ChunkMatcher {
            clusters: set_of(&req.clusters),
            namespaces: set_of(&req.namespaces),
            set_names: set_of(&req.set_names),
            pods: set_of(&req.pods),
            containers: set_of(&req.containers),
            sources: req.sources.iter().map(|s| s.to_string()).collect(),
            labels: set_of(&req.labels),
        }
    }

    fn category_matches(set: &HashSet<String>, value: &str) -> bool {
        set.is_empty() || set.contains(value)
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        Self::category_matches(&self.clusters, &chunk.cluster)
            && Self::category_matches(&self.namespaces, &chunk.namespace)
            && Self::category_matches(&self.set_names, &chunk.set_name)
            && Self::category_matches(&self.pods, &chunk.pod)
            && Self::category_matches(&self.containers, &chunk.container)
            && Self::category_matches(&self.sources, &chunk.source.to_string())
            && self.matches_labels(chunk)
    }

    fn matches_labels(&self, chunk: &Chunk) -> bool {
        if self.labels.is_empty() {
            return true;
        }
        let pairs = chunk.labels.pair_key_set();
        self.labels.iter().any(|wanted| pairs.contains(wanted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlog_model::{Labels, Source};
    use std::collections::BTreeMap;

    fn chunk_with(namespace: &str, labels: &[(&str, &str)]) -> Chunk {
        let mut map = BTreeMap::new();
        for (k, v) in labels {
            map.insert(k.to_string(), v.to_string());
        }
        Chunk {
            id: "id".into(),
            cluster: "local".into(),
            namespace: namespace.into(),
            labels: Labels(map),
            set_name: "web".into(),
            pod: "web-0".into(),
            pod_uid: "uid".into(),
            container: "app".into(),
            source: Source::std_stream(),
            blocks: Vec::new(),
            temp_block: Default::default(),
            started_at: Default::default(),
            updated_at: Default::default(),
            deletion_mark: false,
            deletion_mark_in_block: false,
            line: 0,
            size: 0,
            check_point: None,
            store_addr: String::new(),
            relative_pod_dir: String::new(),
            relative_block_dir: String::new(),
        }
    }

    #[test]
    fn empty_selector_matches_everything() {
        let req = Request::default();
        let matcher = ChunkMatcher::new(&req);
        assert!(matcher.matches(&chunk_with("ns", &[])));
    }

    #[test]
    fn namespace_selector_is_exclusive() {
        let req = Request {
            namespaces: vec!["ns-a".into()],
            ..Default::default()
        };
        let matcher = ChunkMatcher::new(&req);
        assert!(matcher.matches(&chunk_with("ns-a", &[])));
        assert!(!matcher.matches(&chunk_with("ns-b", &[])));
    }

    #[test]
    fn pair_keyed_label_match_avoids_substring_false_positive() {
        let req = Request {
            labels: vec!["env=prod".into()],
            ..Default::default()
        };
        let matcher = ChunkMatcher::new(&req);
        // "env=prod" is a substring of "stage_env=prod2" as raw text, but the
        // pair-keyed set only contains the exact "stage_env=prod2" pair.
        assert!(!matcher.matches(&chunk_with("ns", &[("stage_env", "prod2")])));
        assert!(matcher.matches(&chunk_with("ns", &[("env", "prod")])));
    }
}
