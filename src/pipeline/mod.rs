//! Producer-side signal pipeline
//!
//! Turns strategy decisions into bridge signals:
//! 1. Evaluate every selected strategy for a symbol
//! 2. Keep the most confident non-HOLD decision
//! 3. Drop it if below `min_confidence`
//! 4. Ask the risk assessor for approval and position size
//! 5. Build a `Signal` and hand it to `Bridge::send_signal`
//!
//! The pipeline performs no market or risk computation itself.

pub mod registry;
pub mod traits;
pub mod types;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::core::bridge::Bridge;
use crate::core::signal::{Signal, ValidationError};
use crate::core::store::AdmissionError;
use crate::error::AppError;

pub use registry::StrategyRegistry;
pub use traits::{RiskAssessor, Strategy};
pub use types::{Decision, RiskAssessment, StrategyDecision};

/// Result of running the pipeline for one symbol
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// No strategy produced a tradeable decision
    NoDecision,
    /// Best decision was under the confidence floor
    BelowConfidence { confidence: f64 },
    /// Risk assessor declined
    Rejected,
    /// Queued on the bridge under this id
    Submitted(String),
    /// Bridge refused the signal
    Refused(AdmissionError),
    /// Decision and assessment did not form a valid signal
    Invalid(ValidationError),
}

pub struct SignalPipeline {
    strategies: Vec<Arc<dyn Strategy>>,
    risk: Arc<dyn RiskAssessor>,
    bridge: Arc<Bridge>,
    config: PipelineConfig,
}

impl SignalPipeline {
    pub fn new(
        strategies: Vec<Arc<dyn Strategy>>,
        risk: Arc<dyn RiskAssessor>,
        bridge: Arc<Bridge>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            strategies,
            risk,
            bridge,
            config,
        }
    }

    /// Build with strategies resolved from `config.strategies`
    pub fn from_registry(
        registry: &StrategyRegistry,
        risk: Arc<dyn RiskAssessor>,
        bridge: Arc<Bridge>,
        config: PipelineConfig,
    ) -> Result<Self, AppError> {
        let strategies = registry.select(&config.strategies)?;
        Ok(Self::new(strategies, risk, bridge, config))
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Most confident non-HOLD decision across strategies.
    ///
    /// Ties go to the strategy evaluated first.
    async fn best_decision(&self, symbol: &str) -> Option<StrategyDecision> {
        let mut best: Option<StrategyDecision> = None;
        for strategy in &self.strategies {
            let Some(decision) = strategy.evaluate(symbol).await else {
                continue;
            };
            debug!(
                strategy = strategy.name(),
                symbol = %symbol,
                action = %decision.action,
                confidence = decision.confidence,
                "[PIPELINE] Decision"
            );
            if decision.is_hold() || !decision.confidence.is_finite() {
                continue;
            }
            if best.as_ref().map_or(true, |b| decision.confidence > b.confidence) {
                best = Some(decision);
            }
        }
        best
    }

    pub async fn run_symbol(&self, symbol: &str) -> PipelineOutcome {
        let Some(decision) = self.best_decision(symbol).await else {
            return PipelineOutcome::NoDecision;
        };
        let Some(action) = decision.action.trade_action() else {
            return PipelineOutcome::NoDecision;
        };

        if decision.confidence < self.config.min_confidence {
            debug!(
                symbol = %symbol,
                confidence = decision.confidence,
                min_confidence = self.config.min_confidence,
                "[PIPELINE] Below confidence floor"
            );
            return PipelineOutcome::BelowConfidence {
                confidence: decision.confidence,
            };
        }

        let assessment = self.risk.assess(&decision).await;
        if !assessment.approved {
            info!(symbol = %symbol, action = %action, "[PIPELINE] Not approved by risk assessor");
            return PipelineOutcome::Rejected;
        }

        let signal = Signal::builder(
            symbol,
            action,
            self.config.default_broker.clone(),
            assessment.recommended_lot_size,
        )
        .levels(
            assessment.stop_loss.or(decision.stop_loss),
            assessment.take_profit.or(decision.take_profit),
        )
        .comment(format!(
            "AI Signal: {} (confidence: {:.2})",
            decision.reasoning, decision.confidence
        ))
        .build();

        let signal = match signal {
            Ok(signal) => signal,
            Err(e) => {
                warn!(symbol = %symbol, reason = %e, "[PIPELINE] Invalid signal");
                return PipelineOutcome::Invalid(e);
            }
        };

        let signal_id = signal.id().to_string();
        let lot_size = signal.lot_size();
        match self.bridge.send_signal(signal) {
            Ok(()) => {
                info!(
                    signal_id = %signal_id,
                    action = %action,
                    symbol = %symbol,
                    lot_size = lot_size,
                    "[PIPELINE] Signal sent"
                );
                PipelineOutcome::Submitted(signal_id)
            }
            Err(e) => PipelineOutcome::Refused(e),
        }
    }

    /// Run every symbol in order
    pub async fn run_symbols(&self, symbols: &[String]) -> Vec<(String, PipelineOutcome)> {
        let mut outcomes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            outcomes.push((symbol.clone(), self.run_symbol(symbol).await));
        }
        outcomes
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::pipeline::traits::tests::{FixedRisk, FixedStrategy};
    use std::sync::atomic::Ordering;

    fn decision(action: Decision, confidence: f64, reasoning: &str) -> Option<StrategyDecision> {
        Some(StrategyDecision::new(action, "", confidence, reasoning))
    }

    fn pipeline(
        strategies: Vec<Arc<dyn Strategy>>,
        risk: Arc<FixedRisk>,
    ) -> (SignalPipeline, Arc<Bridge>) {
        let bridge = Arc::new(Bridge::new(&AppConfig::default()));
        let pipeline = SignalPipeline::new(strategies, risk, bridge.clone(), PipelineConfig::default());
        (pipeline, bridge)
    }

    fn approve_with_levels() -> Arc<FixedRisk> {
        Arc::new(FixedRisk::new(
            RiskAssessment::approve(0.05).with_levels(Some(1.0850), Some(1.0900)),
        ))
    }

    #[tokio::test]
    async fn test_best_decision_is_submitted() {
        let risk = approve_with_levels();
        let (pipeline, bridge) = pipeline(
            vec![
                Arc::new(FixedStrategy::new("technical", decision(Decision::Buy, 0.65, "breakout"))),
                Arc::new(FixedStrategy::new("ml", decision(Decision::Buy, 0.82, "model"))),
            ],
            risk.clone(),
        );

        let outcome = pipeline.run_symbol("EURUSD").await;
        let PipelineOutcome::Submitted(signal_id) = outcome else {
            panic!("expected submission, got {:?}", outcome);
        };
        assert!(signal_id.starts_with("EURUSD_BUY_"));

        let queued = bridge.store().take(None);
        assert_eq!(queued.len(), 1);
        let signal = &queued[0];
        assert_eq!(signal.broker(), "EXNESS");
        assert_eq!(signal.lot_size(), 0.05);
        assert_eq!(signal.stop_loss(), Some(1.0850));
        assert_eq!(signal.comment(), "AI Signal: model (confidence: 0.82)");

        let seen = risk.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].reasoning, "model");
        assert_eq!(bridge.get_status().stats.signals_received, 1);
    }

    #[tokio::test]
    async fn test_hold_is_ignored() {
        let (pipeline, bridge) = pipeline(
            vec![
                Arc::new(FixedStrategy::new("a", decision(Decision::Hold, 0.99, "flat"))),
                Arc::new(FixedStrategy::new("b", decision(Decision::Sell, 0.7, "trend"))),
            ],
            Arc::new(FixedRisk::new(RiskAssessment::approve(0.01))),
        );

        assert!(matches!(pipeline.run_symbol("GBPUSD").await, PipelineOutcome::Submitted(_)));
        assert_eq!(bridge.store().take(None)[0].action(), crate::core::signal::TradeAction::Sell);
    }

    #[tokio::test]
    async fn test_no_decision() {
        let strategy = Arc::new(FixedStrategy::new("quiet", None));
        let (pipeline, _bridge) = pipeline(
            vec![strategy.clone() as Arc<dyn Strategy>, Arc::new(FixedStrategy::new("hold", decision(Decision::Hold, 0.9, "")))],
            approve_with_levels(),
        );
        assert_eq!(pipeline.run_symbol("USDJPY").await, PipelineOutcome::NoDecision);
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_below_confidence_skips_risk() {
        let risk = approve_with_levels();
        let (pipeline, bridge) = pipeline(
            vec![Arc::new(FixedStrategy::new("weak", decision(Decision::Buy, 0.55, "meh")))],
            risk.clone(),
        );

        assert_eq!(
            pipeline.run_symbol("EURUSD").await,
            PipelineOutcome::BelowConfidence { confidence: 0.55 }
        );
        assert!(risk.seen.lock().unwrap().is_empty());
        assert!(bridge.store().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_by_risk() {
        let (pipeline, bridge) = pipeline(
            vec![Arc::new(FixedStrategy::new("s", decision(Decision::Buy, 0.9, "x")))],
            Arc::new(FixedRisk::new(RiskAssessment::reject())),
        );
        assert_eq!(pipeline.run_symbol("EURUSD").await, PipelineOutcome::Rejected);
        assert!(bridge.store().is_empty());
    }

    #[tokio::test]
    async fn test_decision_levels_used_when_assessment_has_none() {
        let strategy = FixedStrategy::new(
            "levels",
            Some(
                StrategyDecision::new(Decision::Sell, "", 0.75, "reversal")
                    .with_levels(Some(1.2700), Some(1.2600)),
            ),
        );
        let (pipeline, bridge) = pipeline(
            vec![Arc::new(strategy)],
            Arc::new(FixedRisk::new(RiskAssessment::approve(0.02))),
        );

        assert!(matches!(pipeline.run_symbol("GBPUSD").await, PipelineOutcome::Submitted(_)));
        let queued = bridge.store().take(None);
        let signal = &queued[0];
        assert_eq!(signal.stop_loss(), Some(1.2700));
        assert_eq!(signal.take_profit(), Some(1.2600));
    }

    #[tokio::test]
    async fn test_invalid_levels_reported() {
        // BUY with stop-loss above take-profit
        let risk = Arc::new(FixedRisk::new(
            RiskAssessment::approve(0.01).with_levels(Some(1.10), Some(1.05)),
        ));
        let (pipeline, bridge) = pipeline(
            vec![Arc::new(FixedStrategy::new("s", decision(Decision::Buy, 0.9, "x")))],
            risk,
        );

        assert!(matches!(
            pipeline.run_symbol("EURUSD").await,
            PipelineOutcome::Invalid(ValidationError::BuyLevelsInverted { .. })
        ));
        assert!(bridge.store().is_empty());
    }

    #[tokio::test]
    async fn test_zero_lot_size_is_invalid() {
        let (pipeline, _bridge) = pipeline(
            vec![Arc::new(FixedStrategy::new("s", decision(Decision::Close, 0.9, "x")))],
            Arc::new(FixedRisk::new(RiskAssessment::approve(0.0))),
        );
        assert!(matches!(
            pipeline.run_symbol("EURUSD").await,
            PipelineOutcome::Invalid(ValidationError::NonPositiveLotSize(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_is_refused() {
        let (pipeline, _bridge) = pipeline(
            vec![Arc::new(FixedStrategy::new("s", decision(Decision::Buy, 0.9, "x")))],
            approve_with_levels(),
        );

        let symbols = vec!["EURUSD".to_string(), "EURUSD".to_string()];
        let outcomes = pipeline.run_symbols(&symbols).await;
        assert!(matches!(outcomes[0].1, PipelineOutcome::Submitted(_)));
        // Same symbol, action and second derive the same id; a second
        // boundary between the two runs yields a fresh id instead.
        assert!(matches!(
            outcomes[1].1,
            PipelineOutcome::Refused(AdmissionError::Duplicate(_)) | PipelineOutcome::Submitted(_)
        ));
    }

    #[test]
    fn test_from_registry_unknown_strategy() {
        let bridge = Arc::new(Bridge::new(&AppConfig::default()));
        let config = PipelineConfig {
            strategies: vec!["missing".to_string()],
            ..PipelineConfig::default()
        };
        let result = SignalPipeline::from_registry(
            &StrategyRegistry::new(),
            approve_with_levels(),
            bridge,
            config,
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
