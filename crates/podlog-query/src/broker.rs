//! Fans a request out to a set of remote query endpoints and collects their
//! chunk-list responses. Used both by a query shard fanning out to its
//! peers and by the global querier fanning out across clusters.

use std::time::Duration;

use podlog_model::Chunk;
use tokio::sync::mpsc;

use crate::request::Request;

/// One fan-out target: a cluster name (used by the global querier to scope
/// fan-out to `req.clusters`) and the `host:port` to POST to.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub cluster: String,
    pub addr: String,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchTimeouts {
    pub fetch_timeout: Duration,
    pub fetch_response_header_timeout: Duration,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        FetchTimeouts {
            fetch_timeout: Duration::from_secs(30),
            fetch_response_header_timeout: Duration::from_secs(10),
        }
    }
}

pub fn build_client(timeouts: FetchTimeouts) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeouts.fetch_timeout)
        // `reqwest` has no direct response-header-timeout knob; `connect_timeout`
        // approximates the original's "delays expected during block reads"
        // carve-out for the overall request while still bounding connect time.
        .connect_timeout(timeouts.fetch_response_header_timeout)
        .build()
        .expect("static reqwest client configuration")
}

/// POSTs `req` to every endpoint (narrowed to `req.clusters` when
/// `is_global` is set and the request named any clusters), collecting the
/// union of their chunk-list responses. Endpoints that error or time out
/// simply contribute nothing; the caller sees a partial result rather than
/// a failure, favoring an eventually-consistent federation model over
/// all-or-nothing fan-out.
pub async fn fan_out_chunks(client: &reqwest::Client, scheme: &str, version: &str, endpoints: &[Endpoint], req: &Request, is_global: bool) -> Vec<Chunk> {
    let targets: Vec<&Endpoint> = endpoints
        .iter()
        .filter(|ep| !is_global || req.clusters.is_empty() || req.clusters.iter().any(|c| c == &ep.cluster))
        .collect();

    if targets.is_empty() {
        return Vec::new();
    }

    let (tx, mut rx) = mpsc::channel::<Vec<Chunk>>(targets.len());

    for ep in targets {
        let client = client.clone();
        let url = format!("{scheme}://{}/api/{version}/logs", ep.addr);
        let body = req.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let chunks = fetch_chunks(&client, &url, &body).await;
            let _ = tx.send(chunks).await;
        });
    }
    drop(tx);

    let mut out = Vec::new();
    while let Some(chunks) = rx.recv().await {
        out.extend(chunks);
    }
    out
}

async fn fetch_chunks(client: &reqwest::Client, url: &str, req: &Request) -> Vec<Chunk> {
    match client.post(url).json(req).send().await {
        Ok(resp) if resp.status() == reqwest::StatusCode::NO_CONTENT => Vec::new(),
        Ok(resp) if resp.status().is_success() => resp.json::<Vec<Chunk>>().await.unwrap_or_else(|e| {
            tracing::debug!(error = %e, url, "broker response decode failed");
            Vec::new()
        }),
        Ok(resp) => {
            tracing::debug!(status = %resp.status(), url, "broker fan-out returned an error status");
            Vec::new()
        }
        Err(e) => {
            tracing::debug!(error = %e, url, "broker fan-out request failed");
            Vec::new()
        }
    }
}
