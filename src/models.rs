use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Listing record ───────────────────────────────────────────────────────────

/// Structured result of one listing analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    #[serde(default = "default_title", deserialize_with = "lenient_title")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub make: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_specs")]
    pub specs: Option<Specs>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mileage: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub options: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub highlights: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub concerns: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub overview: Option<String>,
    pub values: ValueEstimates,
    #[serde(default, deserialize_with = "lenient_text")]
    pub value_factors: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Specs {
    #[serde(default, deserialize_with = "lenient_text")]
    pub engine: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub power: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub torque: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub transmission: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub drivetrain: Option<String>,
}

/// Low / fair-market / patient-seller estimates in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueEstimates {
    #[serde(deserialize_with = "amount")]
    pub low: u64,
    #[serde(deserialize_with = "amount")]
    pub medium: u64,
    #[serde(deserialize_with = "amount")]
    pub high: u64,
}

// ── Lenient field decoders ───────────────────────────────────────────────────

/// Year may arrive as a number, a numeric string, null, or a placeholder
/// such as "Not specified"; anything non-numeric is treated as unknown.
fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .and_then(|y| i32::try_from(y).ok()),
        Some(Value::String(s)) => s.trim().parse::<i32>().ok(),
        _ => None,
    })
}

/// Display text: strings pass through, numbers and booleans are stringified,
/// anything else (null, objects, arrays) is treated as absent.
fn text_of(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(text_of))
}

pub const DEFAULT_TITLE: &str = "Vehicle";

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn lenient_title<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(default_title))
}

/// A specs block that is not an object is dropped rather than failing the record.
fn lenient_specs<'de, D>(deserializer: D) -> Result<Option<Specs>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => serde_json::from_value(value)
            .map(Some)
            .map_err(de::Error::custom),
        _ => Ok(None),
    }
}

/// Lists keep their displayable entries; a null or scalar list is empty.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items.into_iter().filter_map(text_of).collect(),
        _ => Vec::new(),
    })
}

/// Accepts `49000`, `49000.4` or `"$49,000"`; rejects negatives and text.
fn amount<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(s),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() && n >= 0.0 => Ok(n.round() as u64),
        Some(n) => Err(de::Error::custom(format!(
            "value estimate must be non-negative, got {n}"
        ))),
        None => Err(de::Error::custom(format!(
            "value estimate must be numeric, got {value}"
        ))),
    }
}

fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' ' | '_'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

// ── HTTP payloads ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct PasteForm {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub url: String,
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "title": "2003 Porsche 911 Carrera 4S",
            "values": {"low": 44500, "medium": 49000, "high": 55000}
        })
    }

    #[test]
    fn decodes_minimal_record_with_defaults() {
        let record: ListingRecord = serde_json::from_value(minimal()).unwrap();
        assert_eq!(record.title, "2003 Porsche 911 Carrera 4S");
        assert_eq!(record.year, None);
        assert!(record.options.is_empty());
        assert!(record.specs.is_none());
        assert_eq!(record.values.medium, 49000);
    }

    #[test]
    fn year_accepts_numbers_and_numeric_strings() {
        let mut v = minimal();
        v["year"] = json!(2003);
        let record: ListingRecord = serde_json::from_value(v.clone()).unwrap();
        assert_eq!(record.year, Some(2003));

        v["year"] = json!("1997");
        let record: ListingRecord = serde_json::from_value(v.clone()).unwrap();
        assert_eq!(record.year, Some(1997));

        v["year"] = json!("Not specified");
        let record: ListingRecord = serde_json::from_value(v).unwrap();
        assert_eq!(record.year, None);
    }

    #[test]
    fn amounts_accept_currency_strings_and_round_floats() {
        let mut v = minimal();
        v["values"] = json!({"low": "$44,500", "medium": 49000.6, "high": "55000"});
        let record: ListingRecord = serde_json::from_value(v).unwrap();
        assert_eq!(
            record.values,
            ValueEstimates { low: 44500, medium: 49001, high: 55000 }
        );
    }

    #[test]
    fn negative_or_textual_amount_is_rejected() {
        let mut v = minimal();
        v["values"]["low"] = json!(-5);
        assert!(serde_json::from_value::<ListingRecord>(v.clone()).is_err());

        v["values"]["low"] = json!("call for price");
        assert!(serde_json::from_value::<ListingRecord>(v).is_err());
    }

    #[test]
    fn missing_values_is_rejected() {
        let v = json!({"title": "Some car"});
        assert!(serde_json::from_value::<ListingRecord>(v).is_err());
    }

    #[test]
    fn null_lists_become_empty() {
        let mut v = minimal();
        v["concerns"] = Value::Null;
        let record: ListingRecord = serde_json::from_value(v).unwrap();
        assert!(record.concerns.is_empty());
    }

    #[test]
    fn numeric_display_fields_are_stringified() {
        let mut v = minimal();
        v["mileage"] = json!(41000);
        v["specs"] = json!({"power": 315, "engine": "3.6L flat-six", "torque": null});
        v["options"] = json!(["Sport seats", 18, {"odd": true}]);
        let record: ListingRecord = serde_json::from_value(v).unwrap();
        assert_eq!(record.mileage.as_deref(), Some("41000"));
        let specs = record.specs.unwrap();
        assert_eq!(specs.power.as_deref(), Some("315"));
        assert_eq!(specs.engine.as_deref(), Some("3.6L flat-six"));
        assert_eq!(specs.torque, None);
        assert_eq!(record.options, vec!["Sport seats".to_string(), "18".to_string()]);
    }

    #[test]
    fn structured_display_fields_are_omitted() {
        let mut v = minimal();
        v["color"] = json!({"exterior": "red"});
        v["specs"] = json!("3.6L flat-six");
        v["highlights"] = json!("one long string");
        let record: ListingRecord = serde_json::from_value(v).unwrap();
        assert_eq!(record.color, None);
        assert!(record.specs.is_none());
        assert!(record.highlights.is_empty());
    }

    #[test]
    fn missing_or_blank_title_falls_back() {
        let v = json!({"values": {"low": 1, "medium": 2, "high": 3}});
        let record: ListingRecord = serde_json::from_value(v).unwrap();
        assert_eq!(record.title, DEFAULT_TITLE);

        let mut v = minimal();
        v["title"] = json!("  ");
        let record: ListingRecord = serde_json::from_value(v).unwrap();
        assert_eq!(record.title, "Vehicle");
    }

    #[test]
    fn value_factors_uses_camel_case_key() {
        let mut v = minimal();
        v["valueFactors"] = json!("Low mileage, full records");
        let record: ListingRecord = serde_json::from_value(v).unwrap();
        assert_eq!(record.value_factors.as_deref(), Some("Low mileage, full records"));
    }
}
