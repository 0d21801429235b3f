//! Movement events as reported by the external feed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, Quantity, StoreCode};

/// Date layouts accepted from the feed, tried in order.
const DATE_FORMATS: [&str; 3] = ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y"];

/// One quantity change for one item/store/date.
///
/// Ephemeral: folded into the ledger, never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementEvent {
    /// Feed-side movement identifier, when the feed reports one.
    pub movement_id: Option<String>,
    pub item_code: String,
    pub store: StoreCode,
    /// Date exactly as reported; may be malformed or in the future.
    pub raw_date: String,
    pub quantity_in: Quantity,
    pub quantity_out: Quantity,
}

/// Day an event applies to, after clamping.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EffectiveDay {
    pub day: NaiveDate,
    /// Set when the reported date was in the future and got clamped to today.
    pub clamped_from: Option<NaiveDate>,
}

impl MovementEvent {
    /// Net effect on a balance: in − out.
    pub fn net(&self) -> Quantity {
        self.quantity_in - self.quantity_out
    }

    /// Resolve the day this event applies to relative to `today`.
    ///
    /// Time of day is discarded; dates after `today` are clamped to `today`.
    pub fn effective_day(&self, today: NaiveDate) -> Result<EffectiveDay, DomainError> {
        let reported = parse_feed_date(&self.raw_date)?;
        if reported > today {
            return Ok(EffectiveDay {
                day: today,
                clamped_from: Some(reported),
            });
        }
        Ok(EffectiveDay {
            day: reported,
            clamped_from: None,
        })
    }
}

/// Parse a feed date at day granularity.
///
/// Accepts `DD/MM/YYYY` (the feed's native layout) and ISO `YYYY-MM-DD`,
/// optionally followed by a time component which is ignored.
pub fn parse_feed_date(raw: &str) -> Result<NaiveDate, DomainError> {
    let date_part = raw
        .trim()
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()
        .unwrap_or_default();

    if date_part.is_empty() {
        return Err(DomainError::malformed_date(raw));
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .ok_or_else(|| DomainError::malformed_date(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(raw_date: &str) -> MovementEvent {
        MovementEvent {
            movement_id: None,
            item_code: "PRD-1".to_string(),
            store: StoreCode::new("VITORIA").unwrap(),
            raw_date: raw_date.to_string(),
            quantity_in: Quantity::from_units(5),
            quantity_out: Quantity::from_units(2),
        }
    }

    #[test]
    fn parses_native_and_iso_layouts() {
        assert_eq!(parse_feed_date("20/03/2025").unwrap(), day(2025, 3, 20));
        assert_eq!(parse_feed_date("2025-03-20").unwrap(), day(2025, 3, 20));
        assert_eq!(parse_feed_date(" 20/03/2025 14:32:10 ").unwrap(), day(2025, 3, 20));
        assert_eq!(parse_feed_date("2025-03-20T23:59:59-03:00").unwrap(), day(2025, 3, 20));
    }

    #[test]
    fn malformed_dates_are_rejected() {
        for raw in ["", "   ", "31/02/2025", "yesterday", "2025/03/20"] {
            match parse_feed_date(raw) {
                Err(DomainError::MalformedDate(_)) => {}
                other => panic!("expected malformed date for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn net_is_in_minus_out() {
        assert_eq!(event("20/03/2025").net(), Quantity::from_units(3));
    }

    #[test]
    fn future_dates_are_clamped_to_today() {
        let today = day(2025, 3, 20);
        let eff = event("25/03/2025").effective_day(today).unwrap();
        assert_eq!(eff.day, today);
        assert_eq!(eff.clamped_from, Some(day(2025, 3, 25)));

        let eff = event("19/03/2025").effective_day(today).unwrap();
        assert_eq!(eff.day, day(2025, 3, 19));
        assert_eq!(eff.clamped_from, None);
    }
}
