use chrono::DateTime;
use rust_decimal::Decimal;
use serde::de::Deserializer;
use serde::Deserialize;
use serde_json::Value;

use crate::types::{OrderBookSnapshot, SaleRecord};

fn vec_or_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let opt = Option::<Vec<T>>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// The API is inconsistent about quoting numbers; accept `"12.5"` and `12.5` alike.
pub fn decimal_from_value(v: &Value) -> Option<Decimal> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            s.parse::<Decimal>()
                .ok()
                .or_else(|| Decimal::from_scientific(s).ok())
        }
        Value::Number(n) => {
            let s = n.to_string();
            s.parse::<Decimal>()
                .ok()
                .or_else(|| Decimal::from_scientific(&s).ok())
        }
        _ => None,
    }
}

fn unix_seconds_from_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Full-export manifest
#[derive(Debug, Deserialize)]
pub struct ManifestResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "vec_or_empty")]
    pub items: Vec<String>,
}

/// get-list-items-info response. `data` is keyed by market hash name and is
/// sometimes `false`/`null` when nothing matched, hence the raw value.
#[derive(Debug, Deserialize)]
pub struct ItemsInfoResponse {
    #[serde(default)]
    pub data: Value,
}

impl ItemsInfoResponse {
    /// `Ok(None)` when the item is absent; `Err` when its entry is present
    /// but not shaped like item info.
    pub fn into_item(self, name: &str) -> Result<Option<ItemInfo>, serde_json::Error> {
        match self.data {
            Value::Object(mut m) => m.remove(name).map(serde_json::from_value).transpose(),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ItemInfo {
    #[serde(default)]
    pub history: Option<Vec<Value>>,
}

impl ItemInfo {
    /// Entries come as `[unix_seconds, price]`; malformed ones are dropped.
    pub fn sales(&self) -> Option<Vec<SaleRecord>> {
        let history = self.history.as_ref()?;
        Some(
            history
                .iter()
                .filter_map(|entry| {
                    let entry = entry.as_array()?;
                    let secs = unix_seconds_from_value(entry.first()?)?;
                    let price = decimal_from_value(entry.get(1)?)?;
                    Some(SaleRecord {
                        at: DateTime::from_timestamp(secs, 0)?,
                        price,
                    })
                })
                .collect(),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct BidAskResponse {
    #[serde(default, deserialize_with = "vec_or_empty")]
    pub bid: Vec<PriceLevel>,
    #[serde(default, deserialize_with = "vec_or_empty")]
    pub ask: Vec<PriceLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceLevel {
    #[serde(default)]
    pub price: Value,
}

impl BidAskResponse {
    pub fn into_snapshot(self) -> OrderBookSnapshot {
        let highest_bid = self
            .bid
            .iter()
            .filter_map(|lvl| decimal_from_value(&lvl.price))
            .max();
        let lowest_ask = self
            .ask
            .iter()
            .filter_map(|lvl| decimal_from_value(&lvl.price))
            .min();
        OrderBookSnapshot {
            highest_bid,
            lowest_ask,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_history_accepts_mixed_number_encodings() {
        let body = r#"{"success":true,"data":{"AK-47 | Redline (Field-Tested)":{
            "history":[[1700000000,"812.50"],["1700086400",799],[1700172800,"bad"],[1700259200]]
        }}}"#;
        let resp: ItemsInfoResponse = serde_json::from_str(body).unwrap();
        let info = resp.into_item("AK-47 | Redline (Field-Tested)").unwrap().unwrap();
        let sales = info.sales().unwrap();
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].price, dec!(812.50));
        assert_eq!(sales[1].price, dec!(799));
        assert_eq!(sales[1].at.timestamp(), 1_700_086_400);
    }

    #[test]
    fn test_missing_item_or_false_data_yields_none() {
        let resp: ItemsInfoResponse =
            serde_json::from_str(r#"{"success":false,"data":false}"#).unwrap();
        assert!(resp.into_item("x").unwrap().is_none());

        let resp: ItemsInfoResponse =
            serde_json::from_str(r#"{"data":{"other":{"history":[]}}}"#).unwrap();
        assert!(resp.into_item("x").unwrap().is_none());

        let resp: ItemsInfoResponse = serde_json::from_str(r#"{"data":{"x":{}}}"#).unwrap();
        assert!(resp.into_item("x").unwrap().unwrap().sales().is_none());
    }

    #[test]
    fn test_non_array_history_entries_are_skipped_one_by_one() {
        let body = r#"{"data":{"x":{"history":[
            [1700000000,"900"],"garbage",{"t":1},null,[1700086400,"910"]
        ]}}}"#;
        let resp: ItemsInfoResponse = serde_json::from_str(body).unwrap();
        let sales = resp.into_item("x").unwrap().unwrap().sales().unwrap();
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[1].price, dec!(910));
    }

    #[test]
    fn test_misshapen_item_entry_is_an_error() {
        let resp: ItemsInfoResponse =
            serde_json::from_str(r#"{"data":{"x":{"history":"n/a"}}}"#).unwrap();
        assert!(resp.into_item("x").is_err());

        let resp: ItemsInfoResponse = serde_json::from_str(r#"{"data":{"x":false}}"#).unwrap();
        assert!(resp.into_item("x").is_err());
    }

    #[test]
    fn test_book_takes_best_of_each_side() {
        let body = r#"{"bid":[{"price":"80.5"},{"price":90},{"price":"n/a"}],
                       "ask":[{"price":120},{"price":"105"}]}"#;
        let resp: BidAskResponse = serde_json::from_str(body).unwrap();
        let book = resp.into_snapshot();
        assert_eq!(book.highest_bid, Some(dec!(90)));
        assert_eq!(book.lowest_ask, Some(dec!(105)));
    }

    #[test]
    fn test_book_sides_may_be_null_or_missing() {
        let resp: BidAskResponse = serde_json::from_str(r#"{"bid":null}"#).unwrap();
        assert!(resp.into_snapshot().is_empty());
    }

    #[test]
    fn test_manifest_defaults() {
        let m: ManifestResponse =
            serde_json::from_str(r#"{"success":true,"items":["a.json","b.json"]}"#).unwrap();
        assert!(m.success);
        assert_eq!(m.items, vec!["a.json", "b.json"]);

        let m: ManifestResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(!m.success);
        assert!(m.items.is_empty());
    }
}
