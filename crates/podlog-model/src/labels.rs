use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const LABEL_KEY_VALUE_DELIMITER: &str = "=";
const LABELS_DELIMITER: &str = ",";

pub const LABELS_FILE_NAME: &str = "labels";

/// Pod labels, carried on a `Chunk` and refreshed from the pod-metadata
/// client. A `BTreeMap` is used (rather than `HashMap`) so label iteration
/// order — and therefore `Display`/`pairs()` output — is stable, which
/// matters for the pair-keyed matcher's cache-friendliness and for
/// deterministic test fixtures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(pub BTreeMap<String, String>);

impl Labels {
    pub fn pairs(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}{LABEL_KEY_VALUE_DELIMITER}{v}"))
            .collect()
    }

    /// The set of `key=value` pairs, used by the pair-keyed label matcher
    /// (: prefer this form over substring matching).
    pub fn pair_key_set(&self) -> std::collections::HashSet<String> {
        self.pairs().into_iter().collect()
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let map: BTreeMap<String, String> =
            serde_json::from_slice(&data).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Labels(map))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.0).unwrap_or_default()
    }
}

impl std::fmt::Display for Labels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pairs().join(LABELS_DELIMITER))
    }
}

impl From<BTreeMap<String, String>> for Labels {
    fn from(map: BTreeMap<String, String>) -> Self {
        Labels(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_stable_and_joined() {
        let mut m = BTreeMap::new();
        m.insert("app".to_string(), "web".to_string());
        m.insert("tier".to_string(), "frontend".to_string());
        let labels = Labels(m);
        assert_eq!(labels.to_string(), "app=web,tier=frontend");
    }
}
