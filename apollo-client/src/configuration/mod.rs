//! Client configuration.

use std::str::FromStr;
use std::time::Duration;

use schemars::gen::SchemaSettings;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::cache::CachePolicy;

const DEFAULT_ENDPOINT: &str = "http://localhost:4000/graphql";
const DEFAULT_ACCEPT_HEADER: &str =
    "multipart/mixed;deferSpec=20220824,application/graphql-response+json,application/json";

/// The configuration of an [`ApolloClient`](crate::ApolloClient).
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// The URL of the GraphQL server.
    pub endpoint: String,

    /// Retries of failed transports.
    pub retry: Retry,

    /// Automatic persisted queries.
    pub persisted_queries: PersistedQueries,

    pub cache: Cache,

    /// Incremental delivery (`@defer`).
    pub incremental: Incremental,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            retry: Default::default(),
            persisted_queries: Default::default(),
            cache: Default::default(),
            incremental: Default::default(),
        }
    }
}

impl Configuration {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// The JSON schema of the configuration file.
    pub fn schema() -> RootSchema {
        let settings = SchemaSettings::draft2019_09().with(|s| {
            s.option_nullable = true;
            s.option_add_null_type = false;
        });
        settings.into_generator().into_root_schema_for::<Configuration>()
    }
}

/// Parse configuration from a string in YAML syntax
impl FromStr for Configuration {
    type Err = serde_yaml::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_yaml(s)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Retry {
    /// How many times a request is sent again after a transport failure; defaults to 3
    pub max_retries: usize,

    /// Waits between attempts. Retries are immediate when absent.
    pub backoff: Option<Backoff>,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: None,
        }
    }
}

#[buildstructor::buildstructor]
impl Retry {
    #[builder]
    pub fn new(max_retries: Option<usize>, backoff: Option<Backoff>) -> Self {
        Self {
            max_retries: max_retries.unwrap_or(3),
            backoff,
        }
    }
}

fn default_base() -> Duration {
    Duration::from_millis(100)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

/// Exponential backoff: attempt `n` waits `base * multiplier^(n-1)`, at most `max_delay`.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Backoff {
    /// The wait after the first failure, in human-readable format; defaults to 100ms
    #[serde(
        deserialize_with = "humantime_serde::deserialize",
        serialize_with = "humantime_serde::serialize",
        default = "default_base"
    )]
    #[schemars(with = "String", default = "default_base")]
    pub base: Duration,

    /// Defaults to 2
    pub multiplier: f64,

    /// The longest wait, in human-readable format; defaults to 10s
    #[serde(
        deserialize_with = "humantime_serde::deserialize",
        serialize_with = "humantime_serde::serialize",
        default = "default_max_delay"
    )]
    #[schemars(with = "String", default = "default_max_delay")]
    pub max_delay: Duration,

    /// Waits a random 50% to 100% of the computed delay; defaults to true
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: default_base(),
            multiplier: 2.0,
            max_delay: default_max_delay(),
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct PersistedQueries {
    /// Sends the hash of the document instead of the document; defaults to false
    pub enabled: bool,

    /// Sends the document when the server does not know the hash; defaults to true
    pub retry_with_document: bool,
}

impl Default for PersistedQueries {
    fn default() -> Self {
        Self {
            enabled: false,
            retry_with_document: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Cache {
    /// The policy of requests that do not set one; defaults to `cache_first`
    pub default_policy: CachePolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Incremental {
    /// The `accept` header sent with every request
    pub accept_header: String,
}

impl Default for Incremental {
    fn default() -> Self {
        Self {
            accept_header: DEFAULT_ACCEPT_HEADER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_apply_to_missing_sections() {
        let configuration = Configuration::from_yaml(
            r#"
retry:
  max_retries: 2
  backoff:
    base: 250ms
    jitter: false
cache:
  default_policy: network_first
"#,
        )
        .unwrap();

        assert_eq!(configuration.retry.max_retries, 2);
        assert_eq!(
            configuration.retry.backoff,
            Some(Backoff {
                base: Duration::from_millis(250),
                multiplier: 2.0,
                max_delay: Duration::from_secs(10),
                jitter: false,
            })
        );
        assert_eq!(configuration.cache.default_policy, CachePolicy::NetworkFirst);
        assert_eq!(configuration.persisted_queries, PersistedQueries::default());
        assert_eq!(configuration.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = "retry:\n  max_retires: 2\n".parse::<Configuration>().unwrap_err();
        assert!(error.to_string().contains("max_retires"));
    }

    #[test]
    fn schema_describes_every_section() {
        let schema = serde_json::to_value(Configuration::schema()).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        for section in ["endpoint", "retry", "persisted_queries", "cache", "incremental"] {
            assert!(properties.contains_key(section), "missing {section}");
        }
    }
}
