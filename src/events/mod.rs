//! Canonical typed events passed between pipeline stages.
//!
//! Every event is an [`Event`]: a shared envelope (timestamp, id, sequence,
//! metadata) around exactly one [`EventPayload`] variant. The tag is derived
//! from the variant, so it can never disagree with the payload.
//!
//! Events are immutable. There is no `&mut` access to any field; the only
//! "changes" are consuming builders that return a new value, and the
//! sequence number, which only a queue can stamp.

pub mod payload;
pub mod stage;

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

pub use payload::{
    CorporateAction, CorporateActionKind, Fill, Latency, LatencyStage, MarketData,
    MarketDataKind, Order, OrderIntent, OrderSide, OrderType, PnL, Position, Risk, RiskAction,
    RiskSeverity, Signal, SignalAction,
};
pub use stage::Stage;

/// Logical event time, always UTC.
pub type Timestamp = DateTime<Utc>;

/// 128 random bits as 32 lowercase hex chars.
pub fn new_id() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Globally unique event identifier, generated once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    MarketData,
    Signal,
    Order,
    Fill,
    Position,
    #[serde(rename = "PNL")]
    PnL,
    Risk,
    CorporateAction,
    Latency,
}

impl EventType {
    pub const ALL: [EventType; 9] = [
        EventType::MarketData,
        EventType::Signal,
        EventType::Order,
        EventType::Fill,
        EventType::Position,
        EventType::PnL,
        EventType::Risk,
        EventType::CorporateAction,
        EventType::Latency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::MarketData => "MARKET_DATA",
            EventType::Signal => "SIGNAL",
            EventType::Order => "ORDER",
            EventType::Fill => "FILL",
            EventType::Position => "POSITION",
            EventType::PnL => "PNL",
            EventType::Risk => "RISK",
            EventType::CorporateAction => "CORPORATE_ACTION",
            EventType::Latency => "LATENCY",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-variant payload. Serialized with the tag in `event_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    MarketData(MarketData),
    Signal(Signal),
    Order(Order),
    Fill(Fill),
    Position(Position),
    #[serde(rename = "PNL")]
    PnL(PnL),
    Risk(Risk),
    CorporateAction(CorporateAction),
    Latency(Latency),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::MarketData(_) => EventType::MarketData,
            EventPayload::Signal(_) => EventType::Signal,
            EventPayload::Order(_) => EventType::Order,
            EventPayload::Fill(_) => EventType::Fill,
            EventPayload::Position(_) => EventType::Position,
            EventPayload::PnL(_) => EventType::PnL,
            EventPayload::Risk(_) => EventType::Risk,
            EventPayload::CorporateAction(_) => EventType::CorporateAction,
            EventPayload::Latency(_) => EventType::Latency,
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        match self {
            EventPayload::MarketData(p) => Some(&p.symbol),
            EventPayload::Signal(p) => Some(&p.symbol),
            EventPayload::Order(p) => Some(&p.symbol),
            EventPayload::Fill(p) => Some(&p.symbol),
            EventPayload::Position(p) => Some(&p.symbol),
            EventPayload::Risk(p) => p.symbol.as_deref(),
            EventPayload::CorporateAction(p) => Some(&p.symbol),
            EventPayload::PnL(_) | EventPayload::Latency(_) => None,
        }
    }

    /// Checks field contents the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        match self {
            EventPayload::MarketData(p) => p.validate(),
            EventPayload::Signal(p) => p.validate(),
            EventPayload::Order(p) => p.validate(),
            EventPayload::Fill(p) => p.validate(),
            EventPayload::Position(p) => p.validate(),
            EventPayload::PnL(p) => p.validate(),
            EventPayload::Risk(p) => p.validate(),
            EventPayload::CorporateAction(p) => p.validate(),
            EventPayload::Latency(p) => p.validate(),
        }
    }
}

macro_rules! payload_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for EventPayload {
                fn from(p: $variant) -> Self {
                    EventPayload::$variant(p)
                }
            }
        )*
    };
}

payload_from!(
    MarketData,
    Signal,
    Order,
    Fill,
    Position,
    PnL,
    Risk,
    CorporateAction,
    Latency,
);

/// Envelope plus payload. See the module docs for the immutability rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    ts_event: Timestamp,
    event_id: EventId,
    #[serde(default)]
    seq: Option<u64>,
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(flatten)]
    payload: EventPayload,
}

impl Event {
    /// Builds an unstamped event with a fresh id and empty metadata.
    pub fn new(ts_event: Timestamp, payload: impl Into<EventPayload>) -> Self {
        Self {
            ts_event,
            event_id: EventId::new(),
            seq: None,
            metadata: Map::new(),
            payload: payload.into(),
        }
    }

    /// Like [`Event::new`], but rejects payloads that fail validation.
    pub fn try_new(ts_event: Timestamp, payload: impl Into<EventPayload>) -> Result<Self> {
        let payload = payload.into();
        payload.validate()?;
        Ok(Self::new(ts_event, payload))
    }

    pub fn market_bar(ts_event: Timestamp, symbol: &str, bar: Map<String, Value>) -> Self {
        Self::new(
            ts_event,
            MarketData {
                symbol: symbol.to_string(),
                data_type: MarketDataKind::Bar,
                payload: bar,
            },
        )
    }

    pub fn signal(ts_event: Timestamp, symbol: &str, action: SignalAction) -> Self {
        Self::new(ts_event, Signal::new(symbol, action))
    }

    pub fn market_order(ts_event: Timestamp, symbol: &str, side: OrderSide, qty: f64) -> Self {
        Self::new(ts_event, Order::market(symbol, side, qty))
    }

    pub fn limit_order(
        ts_event: Timestamp,
        symbol: &str,
        side: OrderSide,
        qty: f64,
        limit_price: f64,
    ) -> Self {
        Self::new(ts_event, Order::limit(symbol, side, qty, limit_price))
    }

    /// Returns a copy carrying one more metadata entry.
    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Copy of `self` with `seq` populated. Only queues call this.
    pub(crate) fn stamped(&self, seq: u64) -> Self {
        Self {
            seq: Some(seq),
            ..self.clone()
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn ts_event(&self) -> Timestamp {
        self.ts_event
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn seq(&self) -> Option<u64> {
        self.seq
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn symbol(&self) -> Option<&str> {
        self.payload.symbol()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts() -> Timestamp {
        DateTime::parse_from_rfc3339("2024-03-01T14:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_tag_follows_variant() {
        let cases: Vec<(EventPayload, EventType)> = vec![
            (MarketData::default().into(), EventType::MarketData),
            (Signal::default().into(), EventType::Signal),
            (Order::default().into(), EventType::Order),
            (Fill::default().into(), EventType::Fill),
            (Position::default().into(), EventType::Position),
            (PnL::default().into(), EventType::PnL),
            (Risk::default().into(), EventType::Risk),
            (CorporateAction::default().into(), EventType::CorporateAction),
            (Latency::default().into(), EventType::Latency),
        ];
        for (payload, expected) in cases {
            let e = Event::new(ts(), payload);
            assert_eq!(e.event_type(), expected);
        }
    }

    #[test]
    fn test_new_event_is_unstamped() {
        let e = Event::signal(ts(), "AAPL", SignalAction::Buy);
        assert_eq!(e.seq(), None);
        assert!(e.metadata().is_empty());
        assert_eq!(e.ts_event(), ts());
    }

    #[test]
    fn test_identical_events_get_distinct_ids() {
        let a = Event::market_order(ts(), "AAPL", OrderSide::Buy, 10.0);
        let b = Event::market_order(ts(), "AAPL", OrderSide::Buy, 10.0);
        assert_ne!(a.event_id(), b.event_id());
    }

    #[test]
    fn test_id_shape() {
        let id = EventId::new();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_stamped_copies_everything_but_seq() {
        let original = Event::signal(ts(), "MSFT", SignalAction::Sell)
            .with_metadata("source", json!("unit"));
        let stamped = original.stamped(7);
        assert_eq!(original.seq(), None);
        assert_eq!(stamped.seq(), Some(7));
        assert_eq!(stamped.event_id(), original.event_id());
        assert_eq!(stamped.metadata(), original.metadata());
        assert_eq!(stamped.payload(), original.payload());
        assert_eq!(stamped.ts_event(), original.ts_event());
    }

    #[test]
    fn test_symbol_accessor() {
        assert_eq!(Event::signal(ts(), "AAPL", SignalAction::Hold).symbol(), Some("AAPL"));
        assert_eq!(Event::new(ts(), PnL::default()).symbol(), None);
        let risk = Risk {
            symbol: Some("TSLA".to_string()),
            ..Risk::default()
        };
        assert_eq!(Event::new(ts(), risk).symbol(), Some("TSLA"));
    }

    #[test]
    fn test_try_new_rejects_malformed() {
        let err = Event::try_new(ts(), Order::default()).unwrap_err();
        assert_eq!(err.code(), "EVENT_MALFORMED");
        assert!(Event::try_new(ts(), Order::market("AAPL", OrderSide::Buy, 5.0)).is_ok());
    }

    #[test]
    fn test_display_matches_wire_tag() {
        for t in EventType::ALL {
            let wire = serde_json::to_value(t).unwrap();
            assert_eq!(wire, json!(t.to_string()));
        }
    }
}
