use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Metric keys the extraction prompt asks for, in report order.
pub const METRIC_KEYS: [&str; 5] = ["revenue", "operating_profit", "eps", "cash_flow", "roe"];

/// Structured financial metrics extracted from one filing.
///
/// Model output is loosely shaped, so deserialization never fails on a JSON
/// object: nulls become defaults, numbers may arrive as strings, text fields
/// may arrive as lists, and any value that does not fit its slot is kept in
/// `extra` under its original key so it survives a verification round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct MetricsRecord {
    pub meta: MetricsMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<MetricSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_profit: Option<MetricSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eps: Option<MetricSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_flow: Option<MetricSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roe: Option<MetricSeries>,
    pub summary: String,
    pub verified: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct MetricsMeta {
    pub currency_symbol: String,
    pub currency_unit: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct MetricSeries {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<DataPoint>,
    pub citation: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    #[serde(default, deserialize_with = "lenient_label")]
    pub year: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub value: Option<f64>,
}

impl MetricsRecord {
    pub fn metric(&self, key: &str) -> Option<&MetricSeries> {
        match key {
            "revenue" => self.revenue.as_ref(),
            "operating_profit" => self.operating_profit.as_ref(),
            "eps" => self.eps.as_ref(),
            "cash_flow" => self.cash_flow.as_ref(),
            "roe" => self.roe.as_ref(),
            _ => None,
        }
    }

    fn metric_slot(&mut self, key: &str) -> Option<&mut Option<MetricSeries>> {
        match key {
            "revenue" => Some(&mut self.revenue),
            "operating_profit" => Some(&mut self.operating_profit),
            "eps" => Some(&mut self.eps),
            "cash_flow" => Some(&mut self.cash_flow),
            "roe" => Some(&mut self.roe),
            _ => None,
        }
    }

    /// Present metrics in [`METRIC_KEYS`] order.
    pub fn metrics(&self) -> impl Iterator<Item = (&'static str, &MetricSeries)> {
        METRIC_KEYS
            .into_iter()
            .filter_map(|key| self.metric(key).map(|series| (key, series)))
    }

    /// Non-empty citations in [`METRIC_KEYS`] order.
    pub fn citations(&self) -> impl Iterator<Item = &str> {
        self.metrics()
            .map(|(_, series)| series.citation.trim())
            .filter(|citation| !citation.is_empty())
    }

    #[must_use]
    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }
}

impl From<Map<String, Value>> for MetricsRecord {
    fn from(mut object: Map<String, Value>) -> Self {
        let mut record = Self {
            meta: match object.remove("meta") {
                Some(Value::Object(meta)) => MetricsMeta::from(meta),
                _ => MetricsMeta::default(),
            },
            summary: object
                .remove("summary")
                .map(|value| text_value(value, "\n"))
                .unwrap_or_default(),
            verified: matches!(object.remove("verified"), Some(Value::Bool(true))),
            ..Self::default()
        };

        for key in METRIC_KEYS {
            match object.remove(key) {
                Some(Value::Object(series)) => {
                    if let Some(slot) = record.metric_slot(key) {
                        *slot = Some(MetricSeries::from(series));
                    }
                }
                Some(Value::Null) | None => {}
                // Scalar or list metrics stay visible under their own key.
                Some(other) => {
                    object.insert(key.to_owned(), other);
                }
            }
        }

        record.extra = object;
        record
    }
}

impl From<Map<String, Value>> for MetricsMeta {
    fn from(mut object: Map<String, Value>) -> Self {
        Self {
            currency_symbol: object
                .remove("currency_symbol")
                .map(|value| text_value(value, " "))
                .unwrap_or_default(),
            currency_unit: object
                .remove("currency_unit")
                .map(|value| text_value(value, " "))
                .unwrap_or_default(),
            extra: object,
        }
    }
}

impl From<Map<String, Value>> for MetricSeries {
    fn from(mut object: Map<String, Value>) -> Self {
        let data = match object.remove("data") {
            Some(Value::Array(points)) => points
                .into_iter()
                .filter_map(|point| serde_json::from_value::<DataPoint>(point).ok())
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                object.insert("data".to_owned(), other);
                Vec::new()
            }
        };
        let citation = object
            .remove("citation")
            .map(|value| text_value(value, "; "))
            .unwrap_or_default();

        Self {
            data,
            citation,
            extra: object,
        }
    }
}

// Strings pass through, lists are joined, other scalars are rendered as JSON.
fn text_value(value: Value, separator: &str) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        Value::Array(items) => items
            .into_iter()
            .map(|item| text_value(item, separator))
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join(separator),
        other => other.to_string(),
    }
}

// Fiscal labels arrive as "FY24", "2023-24" or a bare 2024.
fn lenient_label<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(label) => label,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

// Accepts 12345, "12,345", " 52.2% ", "₹5,400 Cr", "(30)" and null.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => parse_amount(&raw),
        _ => None,
    })
}

/// First numeric run in `raw`, ignoring currency glyphs, unit words and
/// thousands separators. Accounting parentheses mark a negative amount.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let negative = trimmed.starts_with('(') && trimmed.ends_with(')');

    let run = trimmed
        .split(|c: char| !(c.is_ascii_digit() || matches!(c, ',' | '.' | '-')))
        .map(|run| run.trim_matches(|c| matches!(c, ',' | '.')))
        .find(|run| run.chars().any(|c| c.is_ascii_digit()))?;
    let cleaned: String = run.chars().filter(|c| *c != ',').collect();
    let value = cleaned.parse::<f64>().ok()?;

    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_loose_model_output() {
        let record: MetricsRecord = serde_json::from_value(json!({
            "meta": {"currency_symbol": "₹", "currency_unit": "Crores"},
            "revenue": {
                "data": [{"year": "FY24", "value": "1,23,456"}, {"year": 2023, "value": 100.5}],
                "citation": "Annual Report Page 22"
            },
            "eps": null,
            "roe": {"data": null, "citation": null},
            "summary": "Strong year.",
            "segment_notes": ["kept"]
        }))
        .expect("deserialize");

        let revenue = record.revenue.as_ref().expect("revenue present");
        assert_eq!(revenue.data.len(), 2);
        assert_eq!(revenue.data.first().and_then(|p| p.value), Some(123_456.0));
        assert_eq!(
            revenue.data.get(1).map(|p| p.year.as_str()),
            Some("2023")
        );
        assert!(record.eps.is_none());
        assert_eq!(record.roe.as_ref().map(|s| s.data.len()), Some(0));
        assert!(!record.verified);
        assert_eq!(record.extra.get("segment_notes"), Some(&json!(["kept"])));
    }

    #[test]
    fn unknown_fields_survive_serialization() {
        let record: MetricsRecord = serde_json::from_value(json!({
            "revenue": {"data": [], "citation": "Page 3", "link": "x"},
            "profile": {"name": "Acme"}
        }))
        .expect("deserialize");

        let value = serde_json::to_value(record.with_verified(true)).expect("serialize");
        assert_eq!(value["profile"]["name"], "Acme");
        assert_eq!(value["revenue"]["link"], "x");
        assert_eq!(value["verified"], true);
    }

    #[test]
    fn citations_follow_metric_order_and_skip_blanks() {
        let record: MetricsRecord = serde_json::from_value(json!({
            "roe": {"citation": "Page 9"},
            "revenue": {"citation": "Page 2"},
            "eps": {"citation": "  "}
        }))
        .expect("deserialize");

        let citations: Vec<&str> = record.citations().collect();
        assert_eq!(citations, vec!["Page 2", "Page 9"]);
    }

    #[test]
    fn loose_field_shapes_do_not_fail_the_record() {
        let record: MetricsRecord = serde_json::from_value(json!({
            "meta": "INR",
            "summary": ["Revenue grew.", "Margins held."],
            "eps": 12.5,
            "revenue": {"data": [{"year": "FY24", "value": "₹5,400 Cr"}, "bogus"], "citation": 3},
            "cash_flow": {"data": "n/a", "citation": ["Page 4", "Page 5"]},
            "verified": "yes"
        }))
        .expect("deserialize");

        assert_eq!(record.meta, MetricsMeta::default());
        assert_eq!(record.summary, "Revenue grew.\nMargins held.");
        assert!(record.eps.is_none());
        assert_eq!(record.extra["eps"], json!(12.5));
        assert!(!record.verified);

        let revenue = record.revenue.as_ref().expect("revenue");
        assert_eq!(revenue.citation, "3");
        assert_eq!(
            revenue.data,
            vec![DataPoint {
                year: "FY24".into(),
                value: Some(5400.0)
            }]
        );

        let cash_flow = record.cash_flow.as_ref().expect("cash flow");
        assert!(cash_flow.data.is_empty());
        assert_eq!(cash_flow.citation, "Page 4; Page 5");

        // Values parked in `extra` come back out under their original keys.
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["eps"], json!(12.5));
        assert_eq!(value["cash_flow"]["data"], "n/a");
    }

    #[test]
    fn amounts_ignore_currency_units_and_separators() {
        assert_eq!(parse_amount("₹5,400"), Some(5400.0));
        assert_eq!(parse_amount("5,400 Cr"), Some(5400.0));
        assert_eq!(parse_amount("Rs. 5,400.50"), Some(5400.5));
        assert_eq!(parse_amount(" 52.2% "), Some(52.2));
        assert_eq!(parse_amount("-3.1"), Some(-3.1));
        assert_eq!(parse_amount("(30)"), Some(-30.0));
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount(""), None);
    }
}
