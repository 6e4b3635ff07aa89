//! Payload structs, one per event variant, with the defaults producers rely on.
//!
//! Ownership (producer -> consumers) is documented per struct and exposed
//! programmatically in [`super::stage`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{new_id, EventType, Timestamp};
use crate::error::{EventError, Result};

fn require_symbol(event_type: EventType, symbol: &str) -> Result<()> {
    if symbol.trim().is_empty() {
        return Err(EventError::malformed(event_type, "symbol is empty"));
    }
    Ok(())
}

fn require_finite(event_type: EventType, field: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(EventError::malformed(
            event_type,
            format!("{} is not finite: {}", field, value),
        ));
    }
    Ok(())
}

fn require_non_negative(event_type: EventType, field: &str, value: f64) -> Result<()> {
    require_finite(event_type, field, value)?;
    if value < 0.0 {
        return Err(EventError::malformed(
            event_type,
            format!("{} is negative: {}", field, value),
        ));
    }
    Ok(())
}

// =============================================================================
// Enumerations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketDataKind {
    /// OHLCV
    #[default]
    Bar,
    /// bid/ask
    Quote,
    /// last price/size
    Trade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAction {
    Buy,
    Sell,
    #[default]
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    #[default]
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderIntent {
    #[default]
    Create,
    Modify,
    Cancel,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskSeverity {
    #[default]
    Info,
    Warn,
    Breach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskAction {
    #[default]
    None,
    Reduce,
    Halt,
    CancelOrders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorporateActionKind {
    #[default]
    Split,
    Dividend,
    Merger,
    Spinoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LatencyStage {
    Data,
    Signal,
    #[default]
    Order,
    Fill,
}

// =============================================================================
// Payloads
// =============================================================================

/// DataHandler -> Strategy, Portfolio (mark-to-market), Risk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub data_type: MarketDataKind,
    /// Free-form fields for the kind, e.g. `o/h/l/c/v` for a bar.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl MarketData {
    pub(crate) fn validate(&self) -> Result<()> {
        require_symbol(EventType::MarketData, &self.symbol)
    }
}

/// Strategy -> Portfolio, Risk (pre-trade).
///
/// Strategies emit signals, never orders; Portfolio turns signals into orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub action: SignalAction,
    pub strength: f64,
    pub strategy_id: String,
    pub signal_id: String,
}

impl Default for Signal {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            action: SignalAction::Hold,
            strength: 1.0,
            strategy_id: "default".to_string(),
            signal_id: new_id(),
        }
    }
}

impl Signal {
    pub fn new(symbol: &str, action: SignalAction) -> Self {
        Self {
            symbol: symbol.to_string(),
            action,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        require_symbol(EventType::Signal, &self.symbol)?;
        require_finite(EventType::Signal, "strength", self.strength)
    }
}

/// Portfolio (sometimes Risk, as a forced rebalance) -> ExecutionHandler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub side: OrderSide,
    pub qty: f64,
    pub order_type: OrderType,
    pub limit_price: Option<f64>,
    pub intent: OrderIntent,
    pub order_id: String,
    pub parent_signal_id: Option<String>,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            side: OrderSide::Buy,
            qty: 0.0,
            order_type: OrderType::Market,
            limit_price: None,
            intent: OrderIntent::Create,
            order_id: new_id(),
            parent_signal_id: None,
        }
    }
}

impl Order {
    pub fn market(symbol: &str, side: OrderSide, qty: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            qty,
            ..Self::default()
        }
    }

    pub fn limit(symbol: &str, side: OrderSide, qty: f64, limit_price: f64) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, qty)
        }
    }

    /// Links the order back to the signal it was derived from.
    pub fn from_signal(mut self, signal: &Signal) -> Self {
        self.parent_signal_id = Some(signal.signal_id.clone());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let t = EventType::Order;
        require_symbol(t, &self.symbol)?;
        require_non_negative(t, "qty", self.qty)?;
        match (self.order_type, self.limit_price) {
            (OrderType::Limit, None) => {
                Err(EventError::malformed(t, "limit order without limit_price"))
            }
            (OrderType::Limit, Some(px)) if !(px.is_finite() && px > 0.0) => Err(
                EventError::malformed(t, format!("limit_price must be positive: {}", px)),
            ),
            (_, Some(px)) => require_finite(t, "limit_price", px),
            (OrderType::Market, None) => Ok(()),
        }
    }
}

/// ExecutionHandler -> Portfolio, Accounting/Ledger, Risk (post-trade).
/// Sent for full and partial fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub qty_filled: f64,
    pub fill_price: f64,
    pub commission: f64,
    pub slippage: f64,
    pub fill_id: String,
    pub remaining_qty: Option<f64>,
}

impl Default for Fill {
    fn default() -> Self {
        Self {
            order_id: String::new(),
            symbol: String::new(),
            side: OrderSide::Buy,
            qty_filled: 0.0,
            fill_price: 0.0,
            commission: 0.0,
            slippage: 0.0,
            fill_id: new_id(),
            remaining_qty: None,
        }
    }
}

impl Fill {
    /// Fill against `order` with no fees; `remaining_qty` is derived from the order size.
    pub fn for_order(order: &Order, qty_filled: f64, fill_price: f64) -> Self {
        Self {
            order_id: order.order_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            qty_filled,
            fill_price,
            remaining_qty: Some((order.qty - qty_filled).max(0.0)),
            ..Self::default()
        }
    }

    pub fn is_partial(&self) -> bool {
        self.remaining_qty.map_or(false, |q| q > 0.0)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let t = EventType::Fill;
        require_symbol(t, &self.symbol)?;
        require_non_negative(t, "qty_filled", self.qty_filled)?;
        require_non_negative(t, "fill_price", self.fill_price)?;
        require_finite(t, "commission", self.commission)?;
        require_finite(t, "slippage", self.slippage)?;
        if let Some(rem) = self.remaining_qty {
            require_non_negative(t, "remaining_qty", rem)?;
        }
        Ok(())
    }
}

/// Portfolio/Accounting -> Reporting, Risk. Emitted after fills and mark-to-market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub portfolio_id: String,
    pub symbol: String,
    pub position_qty: f64,
    pub avg_price: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            portfolio_id: "default".to_string(),
            symbol: String::new(),
            position_qty: 0.0,
            avg_price: 0.0,
        }
    }
}

impl Position {
    pub(crate) fn validate(&self) -> Result<()> {
        let t = EventType::Position;
        require_symbol(t, &self.symbol)?;
        require_finite(t, "position_qty", self.position_qty)?;
        require_finite(t, "avg_price", self.avg_price)
    }
}

/// Accounting -> Reporting, Risk (drawdown, leverage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnL {
    pub portfolio_id: String,
    pub cash: f64,
    pub equity: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
}

impl Default for PnL {
    fn default() -> Self {
        Self {
            portfolio_id: "default".to_string(),
            cash: 0.0,
            equity: 0.0,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
        }
    }
}

impl PnL {
    pub(crate) fn validate(&self) -> Result<()> {
        let t = EventType::PnL;
        require_finite(t, "cash", self.cash)?;
        require_finite(t, "equity", self.equity)?;
        require_finite(t, "realized_pnl", self.realized_pnl)?;
        require_finite(t, "unrealized_pnl", self.unrealized_pnl)
    }
}

/// RiskManager -> Portfolio (reduce exposure), ExecutionHandler (cancel orders).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub portfolio_id: String,
    pub severity: RiskSeverity,
    pub rule_id: String,
    pub action_required: RiskAction,
    pub symbol: Option<String>,
    pub target_qty: Option<f64>,
    pub reason: String,
}

impl Default for Risk {
    fn default() -> Self {
        Self {
            portfolio_id: "default".to_string(),
            severity: RiskSeverity::Info,
            rule_id: String::new(),
            action_required: RiskAction::None,
            symbol: None,
            target_qty: None,
            reason: String::new(),
        }
    }
}

impl Risk {
    pub(crate) fn validate(&self) -> Result<()> {
        let t = EventType::Risk;
        if self.rule_id.trim().is_empty() {
            return Err(EventError::malformed(t, "rule_id is empty"));
        }
        if let Some(sym) = &self.symbol {
            require_symbol(t, sym)?;
        }
        if let Some(q) = self.target_qty {
            require_finite(t, "target_qty", q)?;
        }
        Ok(())
    }
}

/// CorporateActionHandler (or DataHandler) -> Portfolio/Accounting, Strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorporateAction {
    pub symbol: String,
    pub action_type: CorporateActionKind,
    pub ts_effective: Timestamp,
    /// New shares per old share for splits and spinoffs.
    pub ratio: Option<f64>,
    /// Per-share cash for dividends and cash mergers.
    pub cash_amount: Option<f64>,
    pub source: String,
}

impl Default for CorporateAction {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            action_type: CorporateActionKind::Split,
            ts_effective: Utc::now(),
            ratio: None,
            cash_amount: None,
            source: "data".to_string(),
        }
    }
}

impl CorporateAction {
    pub(crate) fn validate(&self) -> Result<()> {
        let t = EventType::CorporateAction;
        require_symbol(t, &self.symbol)?;
        if let Some(r) = self.ratio {
            require_finite(t, "ratio", r)?;
        }
        if let Some(c) = self.cash_amount {
            require_finite(t, "cash_amount", c)?;
        }
        match self.action_type {
            CorporateActionKind::Split if !self.ratio.map_or(false, |r| r > 0.0) => {
                Err(EventError::malformed(t, "split requires a positive ratio"))
            }
            CorporateActionKind::Dividend if self.cash_amount.is_none() => {
                Err(EventError::malformed(t, "dividend requires a cash_amount"))
            }
            _ => Ok(()),
        }
    }
}

/// Simulator clock / execution simulator -> ExecutionHandler, scheduler.
///
/// The scheduler holds the event named by `delayed_event_id` until `ts_ready`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Latency {
    pub stage: LatencyStage,
    pub ts_ready: Timestamp,
    pub latency_ms: u64,
    pub delayed_event_id: String,
}

impl Default for Latency {
    fn default() -> Self {
        Self {
            stage: LatencyStage::Order,
            ts_ready: Utc::now(),
            latency_ms: 0,
            delayed_event_id: String::new(),
        }
    }
}

impl Latency {
    /// Delay `delayed` by `latency_ms` from its own event time.
    ///
    /// Fails when the ready time falls outside the representable range.
    pub fn delaying(
        delayed: &super::Event,
        stage: LatencyStage,
        latency_ms: u64,
    ) -> Result<Self> {
        let ts_ready = i64::try_from(latency_ms)
            .ok()
            .and_then(chrono::Duration::try_milliseconds)
            .and_then(|d| delayed.ts_event().checked_add_signed(d))
            .ok_or_else(|| {
                EventError::malformed(
                    EventType::Latency,
                    format!("latency_ms out of range: {}", latency_ms),
                )
            })?;
        Ok(Self {
            stage,
            ts_ready,
            latency_ms,
            delayed_event_id: delayed.event_id().to_string(),
        })
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.delayed_event_id.trim().is_empty() {
            return Err(EventError::malformed(
                EventType::Latency,
                "delayed_event_id is empty",
            ));
        }
        Ok(())
    }
}
