use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Section names in the order they are fetched and written.
pub const SECTIONS: [&str; 5] = [
    "accounts",
    "open_positions",
    "recent_orders",
    "open_orders",
    "fills",
];

/// Aggregated read-only account state from the exchange, persisted as one JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub accounts: Value,
    pub open_positions: Value,
    pub recent_orders: Value,
    pub open_orders: Value,
    pub fills: Value,
    pub timestamp: DateTime<Utc>,
    /// Number of top-level keys populated before this one (sections + timestamp).
    pub data_points: usize,
}

impl AccountSnapshot {
    pub fn new(
        accounts: Value,
        open_positions: Value,
        recent_orders: Value,
        open_orders: Value,
        fills: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            accounts,
            open_positions,
            recent_orders,
            open_orders,
            fills,
            timestamp,
            data_points: SECTIONS.len() + 1,
        }
    }

    /// Stand-in written when the exchange could not be read. Every section carries an
    /// explicit `error` marker so the page generator never sees a missing file.
    pub fn fallback(timestamp: DateTime<Utc>, reason: &str) -> Self {
        let marker = |what: &str| json!({ "error": format!("No {what} data available: {reason}") });
        Self::new(
            marker("account"),
            marker("position"),
            marker("recent order"),
            marker("open order"),
            marker("fill"),
            timestamp,
        )
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        match name {
            "accounts" => Some(&self.accounts),
            "open_positions" => Some(&self.open_positions),
            "recent_orders" => Some(&self.recent_orders),
            "open_orders" => Some(&self.open_orders),
            "fills" => Some(&self.fills),
            _ => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        SECTIONS
            .iter()
            .filter_map(|name| self.section(name))
            .all(|v| v.get("error").is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fallback_marks_every_section() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let snap = AccountSnapshot::fallback(ts, "KRAKEN_API_KEY is required");

        for name in SECTIONS {
            let section = snap.section(name).unwrap();
            let msg = section.get("error").and_then(Value::as_str).unwrap();
            assert!(msg.contains("KRAKEN_API_KEY is required"), "{name}: {msg}");
        }
        assert!(snap.is_fallback());
        assert_eq!(snap.data_points, 6);
    }

    #[test]
    fn serializes_with_flat_top_level_keys() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let snap = AccountSnapshot::new(
            json!({"result": "success"}),
            json!({"openPositions": []}),
            json!({"elements": []}),
            json!({"openOrders": []}),
            json!({"fills": []}),
            ts,
        );
        let v = serde_json::to_value(&snap).unwrap();
        let obj = v.as_object().unwrap();

        for name in SECTIONS {
            assert!(obj.contains_key(name), "missing {name}");
        }
        assert_eq!(obj["timestamp"], json!("2026-03-01T12:00:00Z"));
        assert_eq!(obj["data_points"], json!(6));
        assert!(!snap.is_fallback());
    }
}
