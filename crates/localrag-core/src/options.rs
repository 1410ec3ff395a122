//! Per-call retrieval options and their resolution against configured
//! defaults.
//!
//! [`RetrievalOptions`] is what a caller sends (every field optional);
//! [`AppliedOptions`] is what the pipeline actually ran with, echoed back in
//! the result for transparency.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::RetrievalSettings;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOptions {
    #[serde(default)]
    pub k: Option<usize>,
    /// Allow-set of domains; empty or absent means no filtering.
    #[serde(default)]
    pub domains: Option<Vec<String>>,
    #[serde(default, alias = "domainWeights")]
    pub domain_weights: Option<BTreeMap<String, f32>>,
    #[serde(default)]
    pub diversification: Option<DiversificationOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiversificationOptions {
    #[serde(default)]
    pub lambda: Option<f32>,
    #[serde(default, alias = "fetchPoolSize")]
    pub fetch_pool_size: Option<usize>,
}

impl RetrievalOptions {
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = Some(domains.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_domain_weight(mut self, domain: impl Into<String>, weight: f32) -> Self {
        self.domain_weights.get_or_insert_with(BTreeMap::new).insert(domain.into(), weight);
        self
    }

    pub fn with_diversification(mut self, lambda: Option<f32>, fetch_pool_size: Option<usize>) -> Self {
        self.diversification = Some(DiversificationOptions { lambda, fetch_pool_size });
        self
    }

    /// Fill in defaults and validate. Malformed options fail here rather than
    /// being coerced.
    pub fn resolve(&self, settings: &RetrievalSettings) -> Result<AppliedOptions> {
        let k = self.k.unwrap_or(settings.default_k);
        if k == 0 {
            return Err(Error::configuration("k must be at least 1"));
        }

        let domains: Vec<String> = self
            .domains
            .iter()
            .flatten()
            .map(|d| d.trim().to_lowercase())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut domain_weights = BTreeMap::new();
        for (domain, &weight) in self.domain_weights.iter().flatten() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::configuration(format!(
                    "weight for domain '{domain}' must be a finite non-negative number, got {weight}"
                )));
            }
            domain_weights.insert(domain.trim().to_lowercase(), weight);
        }

        let requested_pool = self.diversification.as_ref().and_then(|d| d.fetch_pool_size);
        let fetch_pool_size = requested_pool.unwrap_or_else(|| settings.default_pool_size(k));
        if fetch_pool_size < k {
            return Err(Error::configuration(format!(
                "fetch pool size ({fetch_pool_size}) must not be smaller than k ({k})"
            )));
        }

        let diversification = match &self.diversification {
            None => None,
            Some(req) => {
                let lambda = req.lambda.unwrap_or(settings.lambda);
                if !(0.0..=1.0).contains(&lambda) {
                    return Err(Error::configuration(format!("lambda must be within [0, 1], got {lambda}")));
                }
                settings.penalties.validate()?;
                Some(AppliedDiversification { lambda, penalties: settings.penalties })
            }
        };

        Ok(AppliedOptions { k, fetch_pool_size, domains, domain_weights, diversification })
    }
}

/// Redundancy charged against a candidate that resembles an already
/// selected one. Same-document similarity dominates same-title similarity
/// with the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedundancyPenalties {
    #[serde(default = "default_same_document")]
    pub same_document: f32,
    #[serde(default = "default_same_title")]
    pub same_title: f32,
}

fn default_same_document() -> f32 {
    0.5
}

fn default_same_title() -> f32 {
    0.3
}

impl Default for RedundancyPenalties {
    fn default() -> Self {
        Self { same_document: default_same_document(), same_title: default_same_title() }
    }
}

impl RedundancyPenalties {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("same_document", self.same_document), ("same_title", self.same_title)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::configuration(format!("penalty '{name}' must be finite and non-negative")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedDiversification {
    pub lambda: f32,
    pub penalties: RedundancyPenalties,
}

/// Options with every default resolved.
///
/// `domains` and the keys of `domain_weights` are lowercased so lookups are
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedOptions {
    pub k: usize,
    pub fetch_pool_size: usize,
    pub domains: Vec<String>,
    pub domain_weights: BTreeMap<String, f32>,
    pub diversification: Option<AppliedDiversification>,
}

impl AppliedOptions {
    /// Plain top-k: no filter, no weights, no diversification.
    pub fn top_k(k: usize) -> Self {
        Self {
            k,
            fetch_pool_size: k,
            domains: Vec::new(),
            domain_weights: BTreeMap::new(),
            diversification: None,
        }
    }

    pub fn weight_for(&self, domain_key: &str) -> f32 {
        self.domain_weights.get(domain_key).copied().unwrap_or(1.0)
    }
}
