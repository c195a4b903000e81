//! Prometheus counters fed by the crafting service observer hook.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::warn;

use anvil_engine::BonusKind;
use anvil_exec::{CraftError, Operation, OperationObserver};

use crate::error::DaemonResult;

/// Crafting counters on a private registry.
#[derive(Clone)]
pub struct CraftingMetrics {
    registry: Registry,
    operations: IntCounterVec,
    bonuses: IntCounterVec,
    fallbacks: IntCounterVec,
}

impl CraftingMetrics {
    /// Create and register the counters.
    pub fn new() -> DaemonResult<Self> {
        let registry = Registry::new();

        let operations = IntCounterVec::new(
            Opts::new("anvil_operations_total", "Completed crafting operations"),
            &["operation", "outcome"],
        )?;
        let bonuses = IntCounterVec::new(
            Opts::new("anvil_bonus_triggers_total", "Successful bonus trials"),
            &["kind"],
        )?;
        let fallbacks = IntCounterVec::new(
            Opts::new("anvil_modifier_fallbacks_total", "Modifier lookups that fell back to base chance"),
            &["key"],
        )?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(bonuses.clone()))?;
        registry.register(Box::new(fallbacks.clone()))?;

        Ok(Self { registry, operations, bonuses, fallbacks })
    }

    /// Operations counted for `operation` with outcome label `outcome`.
    ///
    /// The outcome is `ok` or a [`CraftError::kind`] label.
    pub fn operation_count(&self, operation: Operation, outcome: &str) -> u64 {
        self.operations.with_label_values(&[operation.as_str(), outcome]).get()
    }

    /// Successful trials counted for `kind`
    pub fn bonus_count(&self, kind: BonusKind) -> u64 {
        self.bonuses.with_label_values(&[kind.as_str()]).get()
    }

    /// Fallbacks counted for modifier `key`
    pub fn fallback_count(&self, key: &str) -> u64 {
        self.fallbacks.with_label_values(&[key]).get()
    }

    /// Text exposition of every counter.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl OperationObserver for CraftingMetrics {
    fn on_operation(&self, operation: Operation, error: Option<&CraftError>) {
        let outcome = error.map_or("ok", CraftError::kind);
        self.operations.with_label_values(&[operation.as_str(), outcome]).inc();
    }

    fn on_bonus(&self, kind: BonusKind, count: u64) {
        self.bonuses.with_label_values(&[kind.as_str()]).inc_by(count);
    }

    fn on_modifier_fallback(&self, key: &str) {
        self.fallbacks.with_label_values(&[key]).inc();
    }
}

impl std::fmt::Debug for CraftingMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CraftingMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_label() {
        let metrics = CraftingMetrics::new().unwrap();

        metrics.on_operation(Operation::Combine, None);
        metrics.on_operation(Operation::Combine, None);
        metrics.on_operation(Operation::Decompose, Some(&CraftError::InvalidQuantity(0)));
        metrics.on_bonus(BonusKind::Masterwork, 3);
        metrics.on_modifier_fallback("crafting_success_rate");

        assert_eq!(metrics.operation_count(Operation::Combine, "ok"), 2);
        assert_eq!(metrics.operation_count(Operation::Decompose, "invalid_quantity"), 1);
        assert_eq!(metrics.bonus_count(BonusKind::Masterwork), 3);
        assert_eq!(metrics.bonus_count(BonusKind::PerfectSalvage), 0);
        assert_eq!(metrics.fallback_count("crafting_success_rate"), 1);
    }

    #[test]
    fn test_render_exposes_counters() {
        let metrics = CraftingMetrics::new().unwrap();
        metrics.on_operation(Operation::Decompose, None);

        let text = metrics.render();
        assert!(text.contains("anvil_operations_total"));
        assert!(text.contains("operation=\"decompose\""));
    }
}
