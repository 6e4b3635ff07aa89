//! JSON-lines form of events.
//!
//! One event per line: envelope fields (`ts_event`, `event_id`, `seq`,
//! `metadata`), the `event_type` tag and the payload fields side by side.
//! Tag and enum values use their upper-case names (`MARKET_DATA`, `BUY`, ...).
//!
//! Both directions apply the payload rules of [`Event::try_new`]. JSON has
//! no NaN or infinity, so an event that would not survive the trip back is
//! refused before it is written.

use crate::error::Result;
use crate::events::Event;

pub fn encode_line(event: &Event) -> Result<String> {
    event.payload().validate()?;
    Ok(serde_json::to_string(event)?)
}

pub fn decode_line(line: &str) -> Result<Event> {
    let event: Event = serde_json::from_str(line.trim())?;
    event.payload().validate()?;
    Ok(event)
}

/// Decode a JSON-lines document, skipping blank lines.
pub fn decode_lines(input: &str) -> Result<Vec<Event>> {
    input
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(decode_line)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{OrderSide, Signal, SignalAction};
    use chrono::Utc;
    use serde_json::{json, Value};

    #[test]
    fn test_flat_layout() {
        let e = Event::signal(Utc::now(), "AAPL", SignalAction::Buy);
        let v: Value = serde_json::from_str(&encode_line(&e).unwrap()).unwrap();
        assert_eq!(v["event_type"], "SIGNAL");
        assert_eq!(v["action"], "BUY");
        assert_eq!(v["symbol"], "AAPL");
        assert_eq!(v["seq"], Value::Null);
        assert_eq!(v["metadata"], json!({}));
        assert_eq!(v["event_id"], e.event_id().as_str());
    }

    #[test]
    fn test_decode_lines_skips_blanks() {
        let a = Event::market_order(Utc::now(), "AAPL", OrderSide::Buy, 10.0);
        let b = Event::signal(Utc::now(), "MSFT", SignalAction::Sell);
        let doc = format!(
            "{}\n\n  \n{}\n",
            encode_line(&a).unwrap(),
            encode_line(&b).unwrap()
        );
        let decoded = decode_lines(&doc).unwrap();
        assert_eq!(decoded, vec![a, b]);
    }

    #[test]
    fn test_non_finite_is_not_written() {
        let e = Event::new(
            Utc::now(),
            Signal {
                strength: f64::NAN,
                ..Signal::new("AAPL", SignalAction::Buy)
            },
        );
        assert_eq!(encode_line(&e).unwrap_err().code(), "EVENT_MALFORMED");
    }

    #[test]
    fn test_unknown_tag_is_codec_error() {
        let line = r#"{"ts_event":"2024-03-01T14:30:00Z","event_id":"x","event_type":"HEARTBEAT"}"#;
        let err = decode_line(line).unwrap_err();
        assert_eq!(err.code(), "EVENT_CODEC");
    }
}
