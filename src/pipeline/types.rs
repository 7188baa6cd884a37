//! Strategy and risk value types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::signal::TradeAction;

/// What a strategy wants to do with a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Buy,
    Sell,
    Close,
    Modify,
    /// Do nothing; never turned into a signal
    Hold,
}

impl Decision {
    /// The tradeable action, or `None` for HOLD
    pub fn trade_action(&self) -> Option<TradeAction> {
        match self {
            Decision::Buy => Some(TradeAction::Buy),
            Decision::Sell => Some(TradeAction::Sell),
            Decision::Close => Some(TradeAction::Close),
            Decision::Modify => Some(TradeAction::Modify),
            Decision::Hold => None,
        }
    }
}

impl From<TradeAction> for Decision {
    fn from(action: TradeAction) -> Self {
        match action {
            TradeAction::Buy => Decision::Buy,
            TradeAction::Sell => Decision::Sell,
            TradeAction::Close => Decision::Close,
            TradeAction::Modify => Decision::Modify,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.trade_action() {
            Some(action) => f.write_str(action.as_str()),
            None => f.write_str("HOLD"),
        }
    }
}

/// Output of one strategy evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub action: Decision,
    pub symbol: String,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
}

impl StrategyDecision {
    pub fn new(
        action: Decision,
        symbol: impl Into<String>,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            action,
            symbol: symbol.into(),
            confidence,
            reasoning: reasoning.into(),
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn with_levels(mut self, stop_loss: Option<f64>, take_profit: Option<f64>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }

    pub fn is_hold(&self) -> bool {
        self.action == Decision::Hold
    }
}

/// Risk verdict on a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub approved: bool,
    pub recommended_lot_size: f64,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
}

impl RiskAssessment {
    pub fn approve(recommended_lot_size: f64) -> Self {
        Self {
            approved: true,
            recommended_lot_size,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn reject() -> Self {
        Self {
            approved: false,
            recommended_lot_size: 0.0,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn with_levels(mut self, stop_loss: Option<f64>, take_profit: Option<f64>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }
}
