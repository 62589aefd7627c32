//! Name → property registry used by the CLI and other callers.

use std::str::FromStr;
use std::sync::Arc;

use crate::comparator::{Comparator, ComparatorKind};
use crate::error::{ProbeError, Result};
use crate::property::{
    Consistency, Invariance, NegationCoherence, Property, PropertyConfig, Robustness,
};
use crate::transform::{EntitySwapTransform, ParaphraseTransform, TypoTransform};

/// Registry keys, in listing order.
pub const PROPERTY_NAMES: [&str; 4] = ["consistency", "invariance", "negation", "robustness"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Consistency,
    Invariance,
    Negation,
    Robustness,
}

impl PropertyKind {
    pub const ALL: [PropertyKind; 4] = [
        PropertyKind::Consistency,
        PropertyKind::Invariance,
        PropertyKind::Negation,
        PropertyKind::Robustness,
    ];

    /// Registry key. Differs from the result name only for negation.
    pub fn key(&self) -> &'static str {
        match self {
            PropertyKind::Consistency => "consistency",
            PropertyKind::Invariance => "invariance",
            PropertyKind::Negation => "negation",
            PropertyKind::Robustness => "robustness",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PropertyKind::Consistency => {
                "Rephrase the input N ways; outputs should stay semantically equivalent"
            }
            PropertyKind::Invariance => {
                "Swap irrelevant entities; the substance of the answer should not change"
            }
            PropertyKind::Negation => "Negate the input; the answer should change accordingly",
            PropertyKind::Robustness => "Inject typos; the answer should stay the same",
        }
    }

    pub fn default_threshold(&self) -> f64 {
        match self {
            PropertyKind::Consistency => Consistency::DEFAULT_THRESHOLD,
            PropertyKind::Invariance => Invariance::DEFAULT_THRESHOLD,
            PropertyKind::Negation => NegationCoherence::DEFAULT_THRESHOLD,
            PropertyKind::Robustness => Robustness::DEFAULT_THRESHOLD,
        }
    }

    /// Default transform arity; negation always produces one variant.
    pub fn default_arity(&self) -> usize {
        match self {
            PropertyKind::Consistency => ParaphraseTransform::DEFAULT_N,
            PropertyKind::Invariance => EntitySwapTransform::DEFAULT_N,
            PropertyKind::Negation => 1,
            PropertyKind::Robustness => TypoTransform::DEFAULT_N,
        }
    }

    /// Construct the property, validating `options` first.
    pub fn build(&self, options: &PropertyOptions) -> Result<Arc<dyn Property>> {
        let threshold = options.threshold.unwrap_or_else(|| self.default_threshold());
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ProbeError::InvalidConfig(format!(
                "threshold for {} must be within [0, 1], got {threshold}",
                self.key()
            )));
        }
        let arity = options.arity.unwrap_or_else(|| self.default_arity());
        if arity == 0 {
            return Err(ProbeError::InvalidConfig(format!(
                "{} needs at least one variant",
                self.key()
            )));
        }

        let config = PropertyConfig::new(threshold, options.comparator_kind);
        let comparator = options
            .comparator
            .clone()
            .unwrap_or_else(|| config.comparator.build(None));

        let property: Arc<dyn Property> = match self {
            PropertyKind::Consistency => {
                Arc::new(Consistency::new(arity, config).with_comparator(comparator))
            }
            PropertyKind::Invariance => {
                Arc::new(Invariance::new(arity, config).with_comparator(comparator))
            }
            PropertyKind::Negation => {
                Arc::new(NegationCoherence::new(config).with_comparator(comparator))
            }
            PropertyKind::Robustness => Arc::new(
                Robustness::new(arity, options.seed, config).with_comparator(comparator),
            ),
        };
        Ok(property)
    }
}

impl std::fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for PropertyKind {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.key() == wanted)
            .ok_or_else(|| ProbeError::UnknownProperty {
                name: s.to_string(),
                available: PROPERTY_NAMES.iter().map(|n| n.to_string()).collect(),
            })
    }
}

/// Construction options shared by every registry entry.
///
/// Unset fields fall back to the property's own defaults. When `comparator`
/// is set it is shared by every property built from these options, so an
/// embedding model is loaded once per run rather than once per property.
#[derive(Clone, Default)]
pub struct PropertyOptions {
    pub threshold: Option<f64>,
    pub arity: Option<usize>,
    pub seed: Option<u64>,
    pub comparator_kind: ComparatorKind,
    pub comparator: Option<Arc<dyn Comparator>>,
}

impl std::fmt::Debug for PropertyOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyOptions")
            .field("threshold", &self.threshold)
            .field("arity", &self.arity)
            .field("seed", &self.seed)
            .field("comparator_kind", &self.comparator_kind)
            .field("comparator", &self.comparator.as_ref().map(|c| c.name()))
            .finish()
    }
}

/// Look up a property by registry key (case-insensitive) and build it.
pub fn get_property(name: &str, options: &PropertyOptions) -> Result<Arc<dyn Property>> {
    name.parse::<PropertyKind>()?.build(options)
}

/// One-line description of a registered property.
pub fn describe(name: &str) -> Result<&'static str> {
    Ok(name.parse::<PropertyKind>()?.description())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::ExactMatch;

    #[test]
    fn test_every_registered_name_builds() {
        for name in PROPERTY_NAMES {
            let prop = get_property(name, &PropertyOptions::default()).unwrap();
            assert!(prop.name().starts_with(name));
        }
    }

    #[test]
    fn test_negation_key_maps_to_negation_coherence() {
        let prop = get_property("negation", &PropertyOptions::default()).unwrap();
        assert_eq!(prop.name(), "negation_coherence");
        assert_eq!(prop.config().threshold, 0.7);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let prop = get_property(" Consistency ", &PropertyOptions::default()).unwrap();
        assert_eq!(prop.name(), "consistency");
    }

    #[test]
    fn test_unknown_property_lists_valid_names() {
        let err = get_property("fairness", &PropertyOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ProbeError::UnknownProperty { .. }));
        let msg = err.to_string();
        assert!(msg.contains("fairness"));
        assert!(msg.contains("consistency, invariance, negation, robustness"));
    }

    #[test]
    fn test_options_override_defaults() {
        let options = PropertyOptions {
            threshold: Some(0.55),
            comparator_kind: ComparatorKind::Exact,
            ..Default::default()
        };
        let prop = get_property("robustness", &options).unwrap();
        assert_eq!(prop.config().threshold, 0.55);
        assert_eq!(prop.config().comparator, ComparatorKind::Exact);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        for bad in [-0.1, 1.5, f64::NAN] {
            let options = PropertyOptions {
                threshold: Some(bad),
                ..Default::default()
            };
            let err = get_property("consistency", &options).err().unwrap();
            assert!(matches!(err, ProbeError::InvalidConfig(_)));
        }
    }

    #[test]
    fn test_zero_arity_rejected() {
        let options = PropertyOptions {
            arity: Some(0),
            ..Default::default()
        };
        assert!(get_property("invariance", &options).is_err());
    }

    #[test]
    fn test_shared_comparator_is_reused() {
        let shared: Arc<dyn Comparator> = Arc::new(ExactMatch);
        let options = PropertyOptions {
            comparator: Some(shared.clone()),
            ..Default::default()
        };
        let _a = get_property("consistency", &options).unwrap();
        let _b = get_property("negation", &options).unwrap();
        assert_eq!(Arc::strong_count(&shared), 4);
        // `shared` plus one clone held by each property.
        drop(options);
        assert_eq!(Arc::strong_count(&shared), 3);
    }

    #[test]
    fn test_describe() {
        assert!(describe("robustness").unwrap().contains("typos"));
        assert!(describe("nope").is_err());
    }
}
