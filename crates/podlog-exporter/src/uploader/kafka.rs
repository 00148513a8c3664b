//! Produces one Kafka record per newline-delimited line: optional TLS,
//! and SASL PLAIN / SCRAM-SHA-{256,512} / OAUTHBEARER with a cached
//! client-credentials token.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use podlog_model::Chunk;
use podlog_sink::types::{KafkaDestination, KafkaSasl};
use rdkafka::client::{ClientContext, OAuthToken};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use super::{default_file_name, UploadError, Uploader};

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Caches an OAuth bearer token by `(token_url, client_id, client_secret)`,
/// refreshing it once the cached lifetime has elapsed.
struct TokenCache {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl TokenCache {
    fn new(token_url: String, client_id: String, client_secret: String) -> Self {
        TokenCache {
            client: reqwest::Client::new(),
            token_url,
            client_id,
            client_secret,
            cached: Mutex::new(None),
        }
    }

    /// Hash identifying this cache's `(token_url, client_id, client_secret)`
    /// triple, for call sites that want to key a shared cache map by it.
    fn cache_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.token_url.hash(&mut hasher);
        self.client_id.hash(&mut hasher);
        self.client_secret.hash(&mut hasher);
        hasher.finish()
    }

    async fn fetch(&self) -> Result<(String, DateTime<Utc>), UploadError> {
        if let Some((token, expires_at)) = self.cached.lock().unwrap().clone() {
            if expires_at > Utc::now() {
                return Ok((token, expires_at));
            }
        }

        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(UploadError::Status(resp.status().as_u16()));
        }
        let body: TokenResponse = resp.json().await?;
        let lifetime = body.expires_in.unwrap_or(3600).max(60);
        let expires_at = Utc::now() + chrono::Duration::seconds(lifetime);

        *self.cached.lock().unwrap() = Some((body.access_token.clone(), expires_at));
        Ok((body.access_token, expires_at))
    }
}

struct OAuthContext {
    handle: tokio::runtime::Handle,
    tokens: Arc<TokenCache>,
}

/// librdkafka's OAUTHBEARER callback fires from its own internal polling
/// thread, not a Tokio worker, so the cached `Handle` is used to block on
/// the (usually-cached, occasionally-refreshing) async token fetch.
enum KafkaContext {
    Plain,
    OAuth(OAuthContext),
}

impl ClientContext for KafkaContext {
    fn generate_oauth_token(&self, _oauthbearer_config: Option<&str>) -> Result<OAuthToken, Box<dyn std::error::Error>> {
        match self {
            KafkaContext::OAuth(ctx) => {
                let tokens = ctx.tokens.clone();
                let (token, expires_at) = ctx.handle.block_on(async move { tokens.fetch().await })?;
                let lifetime_ms = (expires_at - Utc::now()).num_milliseconds().max(0);
                Ok(OAuthToken {
                    token,
                    principal_name: ctx.tokens.client_id.clone(),
                    lifetime_ms,
                })
            }
            KafkaContext::Plain => Err("OAUTHBEARER token requested without an oauthBearer SASL destination".into()),
        }
    }
}

pub struct KafkaUploader {
    producer: FutureProducer<KafkaContext>,
    topic: String,
    interval: Duration,
}

impl KafkaUploader {
    pub fn new(dest: &KafkaDestination, interval: Duration, handle: tokio::runtime::Handle) -> Result<Self, UploadError> {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", dest.brokers.join(","));
        config.set("message.timeout.ms", "10000");
        config.set("enable.idempotence", "true");

        let sasl_mechanism = |tls: bool| if tls { "sasl_ssl" } else { "sasl_plaintext" };

        if let Some(ca_path) = &dest.ca_cert_path {
            config.set("ssl.ca.location", ca_path);
        }

        let context = match &dest.sasl {
            None => {
                if dest.tls {
                    config.set("security.protocol", "ssl");
                }
                KafkaContext::Plain
            }
            Some(KafkaSasl::Plain { username, password }) => {
                config.set("security.protocol", sasl_mechanism(dest.tls));
                config.set("sasl.mechanism", "PLAIN");
                config.set("sasl.username", username);
                config.set("sasl.password", password);
                KafkaContext::Plain
            }
            Some(KafkaSasl::ScramSha256 { username, password }) => {
                config.set("security.protocol", sasl_mechanism(dest.tls));
                config.set("sasl.mechanism", "SCRAM-SHA-256");
                config.set("sasl.username", username);
                config.set("sasl.password", password);
                KafkaContext::Plain
            }
            Some(KafkaSasl::ScramSha512 { username, password }) => {
                config.set("security.protocol", sasl_mechanism(dest.tls));
                config.set("sasl.mechanism", "SCRAM-SHA-512");
                config.set("sasl.username", username);
                config.set("sasl.password", password);
                KafkaContext::Plain
            }
            Some(KafkaSasl::OAuthBearer { token_url, client_id, client_secret }) => {
                config.set("security.protocol", sasl_mechanism(dest.tls));
                config.set("sasl.mechanism", "OAUTHBEARER");
                let tokens = Arc::new(TokenCache::new(token_url.clone(), client_id.clone(), client_secret.clone()));
                tracing::debug!(cache_key = tokens.cache_key(), "kafka oauthbearer token cache keyed");
                KafkaContext::OAuth(OAuthContext { handle, tokens })
            }
        };

        let producer: FutureProducer<KafkaContext> = config.create_with_context(context).map_err(|e| UploadError::Kafka(e.to_string()))?;
        Ok(KafkaUploader {
            producer,
            topic: dest.topic.clone(),
            interval,
        })
    }
}

#[async_trait]
impl Uploader for KafkaUploader {
    fn validate(&self) -> Result<(), UploadError> {
        if self.topic.is_empty() {
            return Err(UploadError::Invalid("kafka destination is missing a topic".into()));
        }
        Ok(())
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn dir(&self, chunk: &Chunk, _date: DateTime<Utc>) -> String {
        format!("{}/{}/{}", chunk.namespace, chunk.pod, chunk.container)
    }

    fn file_name(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        default_file_name(start, end)
    }

    async fn upload(&self, data: &[u8], _chunk: &Chunk, _p_start: DateTime<Utc>, _p_end: DateTime<Utc>) -> Result<(), UploadError> {
        for line in data.split(|&b| b == b'\n') {
            if line.is_empty() {
                continue;
            }
            let record: FutureRecord<'_, [u8], [u8]> = FutureRecord::to(&self.topic).payload(line);
            self.producer.send(record, Timeout::After(Duration::from_secs(10))).await.map_err(|(e, _)| UploadError::Kafka(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dest() -> KafkaDestination {
        KafkaDestination {
            brokers: vec!["broker:9092".into()],
            topic: "logs".into(),
            tls: false,
            ca_cert_path: None,
            sasl: None,
        }
    }

    #[tokio::test]
    async fn validate_rejects_an_empty_topic() {
        let dest = KafkaDestination { topic: String::new(), ..sample_dest() };
        let uploader = KafkaUploader::new(&dest, Duration::from_secs(60), tokio::runtime::Handle::current()).unwrap();
        assert!(uploader.validate().is_err());
    }

    #[tokio::test]
    async fn validate_accepts_a_populated_topic() {
        let uploader = KafkaUploader::new(&sample_dest(), Duration::from_secs(60), tokio::runtime::Handle::current()).unwrap();
        assert!(uploader.validate().is_ok());
    }

    #[test]
    fn token_cache_key_is_stable_for_the_same_credentials() {
        let a = TokenCache::new("https://idp/token".into(), "id".into(), "secret".into());
        let b = TokenCache::new("https://idp/token".into(), "id".into(), "secret".into());
        assert_eq!(a.cache_key(), b.cache_key());
    }
}
