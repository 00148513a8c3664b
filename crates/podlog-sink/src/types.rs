//! Sink data model: a `Sink` is an operator-managed object naming one
//! or more `Rule`s, each pairing a chunk selector with a destination. The
//! syncer turns these into per-namespace `Preorder`s; the manager turns a
//! matched preorder into an `Order` stamped with one chunk's identity.

use podlog_query::Request;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Destination {
    S3(S3Destination),
    Http(HttpDestination),
    Kafka(KafkaDestination),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Destination {
    pub bucket_name: String,
    pub root_path: String,
    /// Go text/template-style path, e.g. `{{.Namespace}}/{{.Pod}}`; empty
    /// means the default `{rootPath}/{date}/{ns}/{sink}/{rule}/{pod}/
    /// {container}` layout.
    pub path_template: String,
    #[serde(default)]
    pub tags: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpDestination {
    pub destination: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KafkaDestination {
    pub brokers: Vec<String>,
    pub topic: String,
    #[serde(default)]
    pub tls: bool,
    /// Path to a PEM CA bundle used to verify the broker certificate;
    /// absent means the system trust store.
    #[serde(default)]
    pub ca_cert_path: Option<String>,
    #[serde(default)]
    pub sasl: Option<KafkaSasl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mechanism")]
pub enum KafkaSasl {
    Plain { username: String, password: String },
    ScramSha256 { username: String, password: String },
    ScramSha512 { username: String, password: String },
    OAuthBearer { token_url: String, client_id: String, client_secret: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub name: String,
    /// Selector fields only; `start`/`end` are overwritten per-export by
    /// the manager before matching.
    pub request: Request,
    pub destination: Destination,
    /// The uploader's minimum re-export cadence; the exporter skips an order's chunk until
    /// this much time has passed since its receipt's `export_time`.
    #[serde(with = "humantime_serde", default = "default_rule_interval")]
    pub interval: std::time::Duration,
}

fn default_rule_interval() -> std::time::Duration {
    std::time::Duration::from_secs(60)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sink {
    pub namespace: String,
    pub name: String,
    pub rules: Vec<Rule>,
}

/// One sink/rule pair, narrowed to a single namespace, ready to be matched
/// against that namespace's chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preorder {
    pub sink_namespace: String,
    pub sink_name: String,
    pub rule_name: String,
    pub request: Request,
    pub destination: Destination,
    #[serde(with = "humantime_serde")]
    pub interval: std::time::Duration,
}

/// A materialized export task for one chunk, produced by [`crate::manager::Manager::update`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub preorder: Preorder,
    pub chunk_key: String,
    pub namespace: String,
    pub pod: String,
    pub pod_uid: String,
    pub container: String,
    pub source: podlog_model::Source,
}
