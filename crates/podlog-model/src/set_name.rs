use regex::Regex;
use std::sync::OnceLock;

/// Strips the trailing replica/hash suffix from a pod name to recover its
/// stable "set name" (the owning ReplicaSet/StatefulSet name), e.g.
/// `web-7f8c9d6b5-abcde` → `web`.
fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+?)(-[0-9a-zA-Z]{8,10})?-[0-9a-zA-Z]+$").unwrap())
}

#[derive(thiserror::Error, Debug)]
#[error("can't find set name in {0}")]
pub struct SetNameError(pub String);

pub fn find_set_name(pod_name: &str) -> Result<String, SetNameError> {
    pattern()
        .captures(pod_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| SetNameError(pod_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_replicaset_and_pod_suffix() {
        assert_eq!(find_set_name("web-7f8c9d6b5-abcde").unwrap(), "web");
    }

    #[test]
    fn strips_statefulset_ordinal_suffix() {
        assert_eq!(find_set_name("cache-0").unwrap(), "cache");
    }

    #[test]
    fn rejects_bare_name() {
        assert!(find_set_name("x").is_err());
    }
}
