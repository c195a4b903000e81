//! Bonus chance lookup.
//!
//! The chance comes from the modifier provider when one is configured and
//! answers; otherwise the base constant is used. The lookup never fails:
//! it reports where the value came from and leaves logging to the caller.

use crate::ports::ModifierProvider;

/// Where a chance value came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ChanceSource {
    /// The modifier provider answered
    Modifier,
    /// No modifier provider is configured
    BaseNoProvider,
    /// The modifier provider failed
    BaseAfterError(String),
}

/// Chance to use for a batch of trials.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChance {
    /// Per-trial success probability
    pub chance: f64,
    /// Provenance of `chance`
    pub source: ChanceSource,
}

impl ResolvedChance {
    /// True when the provider failed and the base value was substituted
    pub fn fell_back(&self) -> bool {
        matches!(self.source, ChanceSource::BaseAfterError(_))
    }
}

/// Look up `key` with `base` as the default.
pub async fn resolve_chance(
    provider: Option<&dyn ModifierProvider>,
    key: &str,
    base: f64,
) -> ResolvedChance {
    let Some(provider) = provider else {
        return ResolvedChance { chance: base, source: ChanceSource::BaseNoProvider };
    };

    match provider.get_modified_value(key, base).await {
        Ok(chance) => ResolvedChance { chance, source: ChanceSource::Modifier },
        Err(e) => ResolvedChance {
            chance: base,
            source: ChanceSource::BaseAfterError(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{FailingModifier, FixedModifier};

    #[tokio::test]
    async fn test_no_provider_uses_base() {
        let resolved = resolve_chance(None, "crafting_success_rate", 0.1).await;
        assert_eq!(resolved.chance, 0.1);
        assert_eq!(resolved.source, ChanceSource::BaseNoProvider);
        assert!(!resolved.fell_back());
    }

    #[tokio::test]
    async fn test_provider_value_wins() {
        let provider = FixedModifier::new(0.25);
        let resolved = resolve_chance(Some(&provider), "crafting_success_rate", 0.1).await;
        assert_eq!(resolved.chance, 0.25);
        assert_eq!(resolved.source, ChanceSource::Modifier);
        assert_eq!(provider.keys_seen(), vec!["crafting_success_rate".to_string()]);
    }

    #[tokio::test]
    async fn test_provider_error_falls_back() {
        let provider = FailingModifier;
        let resolved = resolve_chance(Some(&provider), "crafting_success_rate", 0.1).await;
        assert_eq!(resolved.chance, 0.1);
        assert!(resolved.fell_back());
    }
}
