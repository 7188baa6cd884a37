//! Trade signal value type
//!
//! A `Signal` is one fully-decided trade intent handed from the producer
//! to the execution agent. It is immutable once built: fields are private
//! and only readable through accessors.
//!
//! # Canonical representation
//! ```json
//! {
//!   "signal_id": "EURUSD_BUY_1767608130",
//!   "symbol": "EURUSD",
//!   "action": "BUY",
//!   "broker": "EXNESS",
//!   "lot_size": 0.01,
//!   "stop_loss": 1.085,
//!   "take_profit": 1.09,
//!   "comment": "",
//!   "timestamp": "2026-01-05T10:15:30.123456Z"
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Shortest symbol accepted by validation
pub const MIN_SYMBOL_LEN: usize = 3;

/// Sub-second digits kept on signal timestamps
const TIMESTAMP_PRECISION: u16 = 6;

// =============================================================================
// Trade Action
// =============================================================================

/// What the execution agent should do with the symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Close,
    Modify,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Close => "CLOSE",
            TradeAction::Modify => "MODIFY",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeAction {
    type Err = ValidationError;

    /// Case-insensitive parse ("buy", "Buy" and "BUY" are the same action)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeAction::Buy),
            "SELL" => Ok(TradeAction::Sell),
            "CLOSE" => Ok(TradeAction::Close),
            "MODIFY" => Ok(TradeAction::Modify),
            _ => Err(ValidationError::InvalidAction(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for TradeAction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Validation
// =============================================================================

/// A field constraint the signal violates. The Display text is the
/// rejection reason reported to the producer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid symbol '{0}': must be at least 3 characters")]
    InvalidSymbol(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Lot size must be positive (got {0})")]
    NonPositiveLotSize(f64),

    #[error("Stop loss must be positive (got {0})")]
    NonPositiveStopLoss(f64),

    #[error("Take profit must be positive (got {0})")]
    NonPositiveTakeProfit(f64),

    #[error("Stop loss must be less than take profit for BUY (stop_loss={stop_loss}, take_profit={take_profit})")]
    BuyLevelsInverted { stop_loss: f64, take_profit: f64 },

    #[error("Stop loss must be greater than take profit for SELL (stop_loss={stop_loss}, take_profit={take_profit})")]
    SellLevelsInverted { stop_loss: f64, take_profit: f64 },
}

// =============================================================================
// Signal
// =============================================================================

/// Immutable trade intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SignalRecord")]
pub struct Signal {
    signal_id: String,
    symbol: String,
    action: TradeAction,
    broker: String,
    lot_size: f64,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
    comment: String,
    #[serde(serialize_with = "timestamp_format::serialize")]
    timestamp: DateTime<Utc>,
}

impl Signal {
    /// Start building a signal with its required fields
    pub fn builder(
        symbol: impl Into<String>,
        action: TradeAction,
        broker: impl Into<String>,
        lot_size: f64,
    ) -> SignalBuilder {
        SignalBuilder {
            symbol: symbol.into(),
            action,
            broker: broker.into(),
            lot_size,
            stop_loss: None,
            take_profit: None,
            comment: String::new(),
            timestamp: None,
            signal_id: None,
        }
    }

    /// Deterministic id: `SYMBOL_ACTION_<unix seconds>`.
    ///
    /// Two signals for the same symbol and action within the same second
    /// share an id, so the second one is rejected as a duplicate.
    pub fn derive_id(symbol: &str, action: TradeAction, timestamp: &DateTime<Utc>) -> String {
        format!("{}_{}_{}", symbol, action, timestamp.timestamp())
    }

    pub fn id(&self) -> &str {
        &self.signal_id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn action(&self) -> TradeAction {
        self.action
    }

    pub fn broker(&self) -> &str {
        &self.broker
    }

    pub fn lot_size(&self) -> f64 {
        self.lot_size
    }

    pub fn stop_loss(&self) -> Option<f64> {
        self.stop_loss
    }

    pub fn take_profit(&self) -> Option<f64> {
        self.take_profit
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Check every field constraint.
    ///
    /// Pure function of the value: calling it any number of times on the
    /// same signal gives the same answer. Rules are checked in a fixed
    /// order and the first violation is returned.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.chars().count() < MIN_SYMBOL_LEN {
            return Err(ValidationError::InvalidSymbol(self.symbol.clone()));
        }

        // NaN fails this comparison too
        if !(self.lot_size > 0.0) {
            return Err(ValidationError::NonPositiveLotSize(self.lot_size));
        }

        if let Some(sl) = self.stop_loss {
            if !(sl > 0.0) {
                return Err(ValidationError::NonPositiveStopLoss(sl));
            }
        }

        if let Some(tp) = self.take_profit {
            if !(tp > 0.0) {
                return Err(ValidationError::NonPositiveTakeProfit(tp));
            }
        }

        if let (Some(stop_loss), Some(take_profit)) = (self.stop_loss, self.take_profit) {
            match self.action {
                TradeAction::Buy if stop_loss >= take_profit => {
                    return Err(ValidationError::BuyLevelsInverted { stop_loss, take_profit });
                }
                TradeAction::Sell if stop_loss <= take_profit => {
                    return Err(ValidationError::SellLevelsInverted { stop_loss, take_profit });
                }
                _ => {}
            }
        }

        Ok(())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} lots @ {} [{}]",
            self.action, self.symbol, self.lot_size, self.broker, self.signal_id
        )
    }
}

/// Builder for `Signal`.
///
/// `build()` validates; `build_unchecked()` does not and exists for
/// replaying values that will be validated later (the store always
/// re-validates on admission).
#[derive(Debug, Clone)]
pub struct SignalBuilder {
    symbol: String,
    action: TradeAction,
    broker: String,
    lot_size: f64,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
    comment: String,
    timestamp: Option<DateTime<Utc>>,
    signal_id: Option<String>,
}

impl SignalBuilder {
    pub fn stop_loss(mut self, stop_loss: f64) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn take_profit(mut self, take_profit: f64) -> Self {
        self.take_profit = Some(take_profit);
        self
    }

    /// Set both protective levels at once, leaving `None`s unset
    pub fn levels(mut self, stop_loss: Option<f64>, take_profit: Option<f64>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Override the creation time (defaults to now)
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Override the derived id
    pub fn signal_id(mut self, signal_id: impl Into<String>) -> Self {
        self.signal_id = Some(signal_id.into());
        self
    }

    pub fn build(self) -> Result<Signal, ValidationError> {
        let signal = self.build_unchecked();
        signal.validate()?;
        Ok(signal)
    }

    pub fn build_unchecked(self) -> Signal {
        let timestamp = self
            .timestamp
            .unwrap_or_else(Utc::now)
            .trunc_subsecs(TIMESTAMP_PRECISION);
        let signal_id = self
            .signal_id
            .unwrap_or_else(|| Signal::derive_id(&self.symbol, self.action, &timestamp));

        Signal {
            signal_id,
            symbol: self.symbol,
            action: self.action,
            broker: self.broker,
            lot_size: self.lot_size,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            comment: self.comment,
            timestamp,
        }
    }
}

/// Wire shape accepted on deserialization. Id and timestamp are optional
/// and filled in the same way the builder does.
#[derive(Deserialize)]
struct SignalRecord {
    #[serde(default)]
    signal_id: Option<String>,
    symbol: String,
    action: TradeAction,
    broker: String,
    lot_size: f64,
    #[serde(default)]
    stop_loss: Option<f64>,
    #[serde(default)]
    take_profit: Option<f64>,
    #[serde(default)]
    comment: String,
    #[serde(default, deserialize_with = "timestamp_format::deserialize_option")]
    timestamp: Option<DateTime<Utc>>,
}

impl From<SignalRecord> for Signal {
    fn from(record: SignalRecord) -> Self {
        let mut builder = Signal::builder(record.symbol, record.action, record.broker, record.lot_size)
            .levels(record.stop_loss, record.take_profit)
            .comment(record.comment);
        if let Some(ts) = record.timestamp {
            builder = builder.timestamp(ts);
        }
        if let Some(id) = record.signal_id {
            builder = builder.signal_id(id);
        }
        builder.build_unchecked()
    }
}

// =============================================================================
// Timestamp Format
// =============================================================================

/// Fixed textual timestamp format shared by signals and bridge responses
pub mod timestamp_format {
    use super::*;

    /// RFC 3339, UTC, microsecond precision
    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Accepts RFC 3339 (any offset) or a naive ISO-8601 timestamp read as UTC
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 15, 30).unwrap()
    }

    fn eurusd_buy() -> SignalBuilder {
        Signal::builder("EURUSD", TradeAction::Buy, "EXNESS", 0.01)
            .stop_loss(1.0850)
            .take_profit(1.0900)
            .timestamp(fixed_time())
    }

    #[test]
    fn test_valid_buy_signal_builds() {
        let signal = eurusd_buy().build().unwrap();
        assert_eq!(signal.symbol(), "EURUSD");
        assert_eq!(signal.action(), TradeAction::Buy);
        assert_eq!(signal.lot_size(), 0.01);
        assert!(signal.validate().is_ok());
    }

    #[test]
    fn test_id_derived_from_symbol_action_and_second() {
        let signal = eurusd_buy().build().unwrap();
        assert_eq!(signal.id(), format!("EURUSD_BUY_{}", fixed_time().timestamp()));
    }

    #[test]
    fn test_same_second_signals_share_id() {
        let a = eurusd_buy().build().unwrap();
        let b = eurusd_buy()
            .timestamp(fixed_time() + chrono::Duration::milliseconds(400))
            .build()
            .unwrap();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_explicit_id_is_kept() {
        let signal = eurusd_buy().signal_id("custom-1").build().unwrap();
        assert_eq!(signal.id(), "custom-1");
    }

    #[test]
    fn test_short_symbol_fails() {
        let err = Signal::builder("EU", TradeAction::Buy, "EXNESS", 0.01).build().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSymbol(_)));
        assert!(err.to_string().contains("Invalid symbol"));
    }

    #[test]
    fn test_symbol_length_counts_characters_as_given() {
        // Whitespace is not stripped before counting
        assert!(Signal::builder(" EU", TradeAction::Buy, "EXNESS", 0.01).build().is_ok());
        // Characters, not bytes
        assert!(Signal::builder("€$", TradeAction::Buy, "EXNESS", 0.01).build().is_err());
        assert!(Signal::builder("€$£", TradeAction::Buy, "EXNESS", 0.01).build().is_ok());
    }

    #[test]
    fn test_zero_and_nan_lot_size_fail() {
        let zero = Signal::builder("EURUSD", TradeAction::Sell, "EXNESS", 0.0).build();
        assert!(matches!(zero, Err(ValidationError::NonPositiveLotSize(_))));

        let nan = Signal::builder("EURUSD", TradeAction::Sell, "EXNESS", f64::NAN).build();
        assert!(matches!(nan, Err(ValidationError::NonPositiveLotSize(_))));
    }

    #[test]
    fn test_negative_levels_fail() {
        let sl = Signal::builder("EURUSD", TradeAction::Close, "EXNESS", 0.1)
            .stop_loss(-1.0)
            .build();
        assert!(matches!(sl, Err(ValidationError::NonPositiveStopLoss(_))));

        let tp = Signal::builder("EURUSD", TradeAction::Close, "EXNESS", 0.1)
            .take_profit(0.0)
            .build();
        assert!(matches!(tp, Err(ValidationError::NonPositiveTakeProfit(_))));
    }

    #[test]
    fn test_buy_stop_loss_at_or_above_take_profit_fails() {
        let equal = eurusd_buy().stop_loss(1.09).take_profit(1.09).build().unwrap_err();
        assert!(matches!(equal, ValidationError::BuyLevelsInverted { .. }));

        let above = eurusd_buy().stop_loss(1.10).take_profit(1.09).build().unwrap_err();
        assert!(above.to_string().contains("less than take profit for BUY"));
    }

    #[test]
    fn test_sell_stop_loss_at_or_below_take_profit_fails() {
        let err = Signal::builder("EURUSD", TradeAction::Sell, "EXNESS", 0.01)
            .stop_loss(1.0850)
            .take_profit(1.0900)
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::SellLevelsInverted { .. }));
        assert!(err.to_string().contains("greater than take profit for SELL"));

        let ok = Signal::builder("EURUSD", TradeAction::Sell, "EXNESS", 0.01)
            .stop_loss(1.0900)
            .take_profit(1.0850)
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_level_ordering_ignored_for_close_and_modify() {
        for action in [TradeAction::Close, TradeAction::Modify] {
            let signal = Signal::builder("XAUUSD", action, "EXNESS", 1.0)
                .stop_loss(2000.0)
                .take_profit(1900.0)
                .build();
            assert!(signal.is_ok(), "{} should not check level ordering", action);
        }
    }

    #[test]
    fn test_validate_is_idempotent() {
        let invalid = eurusd_buy().stop_loss(2.0).build_unchecked();
        let first = invalid.validate();
        let second = invalid.validate();
        assert_eq!(first, second);
        assert!(first.is_err());
    }

    #[test]
    fn test_action_parse_is_case_insensitive() {
        assert_eq!("buy".parse::<TradeAction>().unwrap(), TradeAction::Buy);
        assert_eq!("Modify".parse::<TradeAction>().unwrap(), TradeAction::Modify);
        assert!("HOLD".parse::<TradeAction>().is_err());
    }

    #[test]
    fn test_json_roundtrip_preserves_value() {
        let signal = eurusd_buy()
            .timestamp(fixed_time() + chrono::Duration::nanoseconds(123_456_789))
            .comment("roundtrip")
            .build()
            .unwrap();
        let json = signal.to_json().unwrap();
        assert!(json.contains("\"timestamp\":\"2026-01-05T10:15:30.123456Z\""), "{}", json);
        assert!(json.contains("\"action\":\"BUY\""));

        let decoded = Signal::from_json(&json).unwrap();
        assert_eq!(decoded, signal);
    }

    #[test]
    fn test_deserialize_fills_missing_id_and_accepts_naive_timestamp() {
        let json = r#"{
            "symbol": "GBPUSD",
            "action": "sell",
            "broker": "EXNESS",
            "lot_size": 0.02,
            "timestamp": "2026-01-05T10:15:30.500000"
        }"#;
        let signal = Signal::from_json(json).unwrap();
        assert_eq!(signal.action(), TradeAction::Sell);
        assert_eq!(signal.id(), format!("GBPUSD_SELL_{}", fixed_time().timestamp()));
        assert_eq!(signal.stop_loss(), None);
        assert_eq!(signal.comment(), "");
    }

    #[test]
    fn test_deserialize_does_not_validate() {
        let json = r#"{"symbol": "X", "action": "BUY", "broker": "EXNESS", "lot_size": -1.0}"#;
        let signal = Signal::from_json(json).unwrap();
        assert!(signal.validate().is_err());
    }

    #[test]
    fn test_deserialize_rejects_unknown_action() {
        let json = r#"{"symbol": "EURUSD", "action": "HOLD", "broker": "EXNESS", "lot_size": 1.0}"#;
        assert!(Signal::from_json(json).is_err());
    }
}
