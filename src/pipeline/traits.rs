//! Producer-side capability traits
//!
//! Strategies and risk assessors are supplied by the surrounding service;
//! the pipeline only orchestrates them. Both are object-safe so they can
//! be registered by name and selected from configuration.

use async_trait::async_trait;

use crate::pipeline::types::{RiskAssessment, StrategyDecision};

/// A source of trade decisions for a symbol
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
///
/// struct Momentum;
///
/// #[async_trait]
/// impl Strategy for Momentum {
///     fn name(&self) -> &str {
///         "momentum"
///     }
///
///     async fn evaluate(&self, symbol: &str) -> Option<StrategyDecision> {
///         // read market data, score, decide
///         None
///     }
/// }
/// ```
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Registry key
    fn name(&self) -> &str;

    /// Decide for `symbol`. `None` means the strategy has no opinion
    /// (missing data, warm-up, internal failure it has already logged).
    async fn evaluate(&self, symbol: &str) -> Option<StrategyDecision>;
}

/// Approves or rejects a decision and sizes the position
#[async_trait]
pub trait RiskAssessor: Send + Sync {
    async fn assess(&self, decision: &StrategyDecision) -> RiskAssessment;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Strategy returning a fixed decision and counting evaluations
    pub struct FixedStrategy {
        name: String,
        decision: Option<StrategyDecision>,
        pub calls: AtomicUsize,
    }

    impl FixedStrategy {
        pub fn new(name: &str, decision: Option<StrategyDecision>) -> Self {
            Self {
                name: name.to_string(),
                decision,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Strategy for FixedStrategy {
        fn name(&self) -> &str {
            &self.name
        }

        async fn evaluate(&self, symbol: &str) -> Option<StrategyDecision> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.decision.clone().map(|mut d| {
                d.symbol = symbol.to_string();
                d
            })
        }
    }

    /// Risk assessor returning a fixed verdict and recording what it saw
    pub struct FixedRisk {
        verdict: RiskAssessment,
        pub seen: Mutex<Vec<StrategyDecision>>,
    }

    impl FixedRisk {
        pub fn new(verdict: RiskAssessment) -> Self {
            Self {
                verdict,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RiskAssessor for FixedRisk {
        async fn assess(&self, decision: &StrategyDecision) -> RiskAssessment {
            self.seen.lock().unwrap().push(decision.clone());
            self.verdict.clone()
        }
    }

    #[tokio::test]
    async fn test_fixed_strategy_stamps_symbol() {
        use crate::pipeline::types::Decision;

        let strategy = FixedStrategy::new(
            "fixed",
            Some(StrategyDecision::new(Decision::Buy, "", 0.8, "test")),
        );
        let decision = strategy.evaluate("EURUSD").await.unwrap();
        assert_eq!(decision.symbol, "EURUSD");
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
    }
}
