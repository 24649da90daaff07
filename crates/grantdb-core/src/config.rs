//! Configuration loading and the retrieval tuning surface.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `GRANTDB_*`
//! env vars. `RetrievalConfig` is constructed once at startup, validated, and
//! then lives for the whole process; only `recency_weight` may be overridden
//! per call.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Result, RetrievalError};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("GRANTDB_").split("__"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }
}

/// Tuning knobs for the hybrid retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Weight of the semantic path in score fusion, in [0, 1].
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    /// Weight of the lexical path in score fusion, in [0, 1].
    /// The two weights need not sum to 1.
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,
    /// Recency blend applied when a call does not override it, in [0, 1].
    #[serde(default = "default_recency_weight")]
    pub default_recency_weight: f32,
    /// Cap on chunks contributed by a single source document.
    #[serde(default = "default_max_per_doc")]
    pub max_per_doc: usize,
    /// Run the external cross-encoder rerank step when a reranker is wired in.
    #[serde(default)]
    pub enable_reranking: bool,
    /// Append domain abbreviation expansions to the query.
    #[serde(default = "default_true")]
    pub expand_query: bool,
    /// Each path fetches `top_k * candidate_multiplier` candidates so fusion
    /// and diversification have enough to work with.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
}

fn default_vector_weight() -> f32 {
    0.7
}

fn default_keyword_weight() -> f32 {
    0.3
}

fn default_recency_weight() -> f32 {
    0.1
}

fn default_max_per_doc() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_candidate_multiplier() -> usize {
    4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_weight: default_vector_weight(),
            keyword_weight: default_keyword_weight(),
            default_recency_weight: default_recency_weight(),
            max_per_doc: default_max_per_doc(),
            enable_reranking: false,
            expand_query: true,
            candidate_multiplier: default_candidate_multiplier(),
        }
    }
}

impl RetrievalConfig {
    /// Extracts the `[retrieval]` section, falling back to defaults when the
    /// section is absent.
    pub fn from_config(config: &Config) -> Self {
        config.get("retrieval").unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("vector_weight", self.vector_weight),
            ("keyword_weight", self.keyword_weight),
            ("default_recency_weight", self.default_recency_weight),
        ] {
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(RetrievalError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if self.max_per_doc == 0 {
            return Err(RetrievalError::InvalidConfig(
                "max_per_doc must be positive".to_string(),
            ));
        }
        if self.candidate_multiplier == 0 {
            return Err(RetrievalError::InvalidConfig(
                "candidate_multiplier must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after
/// expansion. Absolute paths are returned as-is.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RetrievalConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.vector_weight > config.keyword_weight);
        assert_eq!(config.candidate_multiplier, 4);
        assert!(config.expand_query);
        assert!(!config.enable_reranking);
    }

    #[test]
    fn out_of_range_weight_is_rejected() {
        let config = RetrievalConfig {
            vector_weight: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RetrievalConfig {
            keyword_weight: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_per_doc_is_rejected() {
        let config = RetrievalConfig {
            max_per_doc: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_with_base_keeps_absolute_paths() {
        let base = Path::new("/srv/grantdb");
        assert_eq!(resolve_with_base(base, "/tmp/x"), PathBuf::from("/tmp/x"));
        assert_eq!(
            resolve_with_base(base, "data/chunks"),
            PathBuf::from("/srv/grantdb/data/chunks")
        );
    }
}
