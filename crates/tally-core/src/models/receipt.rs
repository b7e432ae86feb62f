//! Receipt data models matching the extraction response schema.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Structured data extracted from a single receipt.
///
/// `total_amount` is the authoritative total. `subtotal_amount` and
/// `tax_amount` are advisory and use `0.0` when the receipt does not show them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Merchant name as printed.
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub store_name: String,

    /// Purchase timestamp.
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub receipt_date: Option<DateTime<Utc>>,

    /// Final amount paid.
    #[serde(default, deserialize_with = "lenient::amount")]
    pub total_amount: f64,

    /// ISO 4217 currency code.
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub currency: String,

    /// Line items in printed order.
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub items: Vec<ReceiptLineItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_phone: Option<String>,

    #[serde(default, deserialize_with = "lenient::amount", skip_serializing_if = "is_zero")]
    pub tax_amount: f64,

    #[serde(default, deserialize_with = "lenient::amount", skip_serializing_if = "is_zero")]
    pub subtotal_amount: f64,

    #[serde(default, deserialize_with = "lenient::amount", skip_serializing_if = "is_zero")]
    pub discount_amount: f64,

    #[serde(default, deserialize_with = "lenient::amount", skip_serializing_if = "is_zero")]
    pub tip_amount: f64,

    /// Payment method as printed (card, cash, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last_digits: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cashier_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register_number: Option<String>,

    /// Household budget classification.
    #[serde(default, deserialize_with = "lenient::category", skip_serializing_if = "Option::is_none")]
    pub expense_category: Option<ExpenseCategory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Open extension fields reported by the extractor.
    #[serde(default, deserialize_with = "lenient::or_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, String>,

    /// Raw payload the record was decoded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,

    /// Extractor confidence (0.0 - 1.0).
    #[serde(default, deserialize_with = "lenient::confidence", skip_serializing_if = "is_zero")]
    pub confidence_level: f64,
}

/// A single purchased item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLineItem {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub name: String,

    /// Quantity; fractional for weighed goods.
    #[serde(default, deserialize_with = "lenient::amount")]
    pub quantity: f64,

    #[serde(default, deserialize_with = "lenient::amount")]
    pub unit_price: f64,

    /// Line total as printed.
    #[serde(default, deserialize_with = "lenient::amount")]
    pub total_price: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,

    #[serde(default, deserialize_with = "lenient::amount", skip_serializing_if = "is_zero")]
    pub discount: f64,

    #[serde(default, deserialize_with = "lenient::amount", skip_serializing_if = "is_zero")]
    pub tax_amount: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ReceiptLineItem {
    /// Create an item with a name and a single unit.
    pub fn new(name: impl Into<String>, unit_price: f64) -> Self {
        Self {
            name: name.into(),
            quantity: 1.0,
            unit_price,
            total_price: unit_price,
            ..Self::default()
        }
    }
}

/// Household budget categories a receipt is classified into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExpenseCategory {
    /// Restaurants, supermarkets, convenience stores, cafes.
    Food,
    /// Fuel, tolls, parking, public transport.
    Transportation,
    /// Home supplies, cleaning products, furniture.
    Household,
    /// Pharmacies, hospitals, clinics.
    Medical,
    /// Movies, books, entertainment, sports.
    CultureLeisure,
    /// Courses, tuition, school supplies.
    Education,
    /// Phone and internet bills.
    Communication,
    /// Anything else.
    Other,
    /// A label outside the closed set, kept verbatim.
    Unrecognized(UnknownCategory),
}

/// A non-blank category label that matches none of the known categories.
///
/// Only [`ExpenseCategory::parse`] creates one, so the label always reads back
/// as the same variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnknownCategory(String);

impl UnknownCategory {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ExpenseCategory {
    /// The closed set, in prompt order.
    pub const ALL: [ExpenseCategory; 8] = [
        ExpenseCategory::Food,
        ExpenseCategory::Transportation,
        ExpenseCategory::Household,
        ExpenseCategory::Medical,
        ExpenseCategory::CultureLeisure,
        ExpenseCategory::Education,
        ExpenseCategory::Communication,
        ExpenseCategory::Other,
    ];

    /// Stable machine key, used on the wire and in spreadsheet rows.
    pub fn key(&self) -> &str {
        match self {
            ExpenseCategory::Food => "food",
            ExpenseCategory::Transportation => "transportation",
            ExpenseCategory::Household => "household",
            ExpenseCategory::Medical => "medical",
            ExpenseCategory::CultureLeisure => "culture_leisure",
            ExpenseCategory::Education => "education",
            ExpenseCategory::Communication => "communication",
            ExpenseCategory::Other => "other",
            ExpenseCategory::Unrecognized(label) => label.as_str(),
        }
    }

    /// Display label.
    pub fn label(&self) -> &str {
        match self {
            ExpenseCategory::Food => "Food & Groceries",
            ExpenseCategory::Transportation => "Transportation",
            ExpenseCategory::Household => "Household Items",
            ExpenseCategory::Medical => "Medical",
            ExpenseCategory::CultureLeisure => "Culture/Leisure",
            ExpenseCategory::Education => "Education",
            ExpenseCategory::Communication => "Communication",
            ExpenseCategory::Other => "Other",
            ExpenseCategory::Unrecognized(label) => label.as_str(),
        }
    }

    /// Typical merchants, as listed in the extraction prompt.
    pub fn examples(&self) -> &'static str {
        match self {
            ExpenseCategory::Food => "restaurants, supermarkets, convenience stores, cafes",
            ExpenseCategory::Transportation => "gas stations, tolls, parking, public transport",
            ExpenseCategory::Household => "home supplies, cleaning products, furniture",
            ExpenseCategory::Medical => "pharmacies, hospitals, clinics",
            ExpenseCategory::CultureLeisure => "movies, books, entertainment, sports",
            ExpenseCategory::Education => "books, courses, supplies",
            ExpenseCategory::Communication => "phone bills, internet",
            ExpenseCategory::Other | ExpenseCategory::Unrecognized(_) => "anything else",
        }
    }

    /// Parse a category from a key, display label, or legacy Korean label.
    ///
    /// Returns `None` for blank input; unknown labels become `Unrecognized`.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }

        let lowered = trimmed.to_lowercase();
        let known = Self::ALL.into_iter().find(|c| {
            c.key() == lowered || c.label().to_lowercase() == lowered || c.legacy_label() == trimmed
        });

        Some(known.unwrap_or_else(|| {
            ExpenseCategory::Unrecognized(UnknownCategory(trimmed.to_string()))
        }))
    }

    fn legacy_label(&self) -> &'static str {
        match self {
            ExpenseCategory::Food => "식비",
            ExpenseCategory::Transportation => "교통비",
            ExpenseCategory::Household => "생활용품",
            ExpenseCategory::Medical => "의료",
            ExpenseCategory::CultureLeisure => "문화/여가",
            ExpenseCategory::Education => "교육",
            ExpenseCategory::Communication => "통신",
            ExpenseCategory::Other => "기타",
            ExpenseCategory::Unrecognized(_) => "",
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for ExpenseCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for ExpenseCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ExpenseCategory::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom("expense category is empty"))
    }
}

impl ReceiptRecord {
    /// Decode a record from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Encode the record as compact JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Encode the record as indented JSON.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

/// Parse a receipt timestamp in any of the shapes the extractor produces.
///
/// Accepts RFC 3339, a naive date-time (taken as UTC), or a bare date.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a printed amount such as `"$1,250.50"`, `"12,50"` or `"1.250,50 EUR"`.
///
/// The last `,` or `.` is the decimal point and the other separator groups
/// thousands. A separator that repeats groups thousands too. Returns `None`
/// when the text holds no digits or could be read either way (`"1,250"`).
pub fn parse_amount(text: &str) -> Option<f64> {
    let negative = text.chars().find(|c| c.is_ascii_digit() || *c == '-') == Some('-');

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == ',' || c == '.');
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match cleaned.rfind([',', '.']) {
        None => cleaned.to_string(),
        Some(pos) => {
            let separator = if cleaned[pos..].starts_with(',') { ',' } else { '.' };
            let (whole, fraction) = (&cleaned[..pos], &cleaned[pos + 1..]);
            let digits: String = whole.chars().filter(char::is_ascii_digit).collect();
            let mixed = whole.contains(if separator == ',' { '.' } else { ',' });

            if whole.contains(separator) {
                // Repeated separator: "1,250,000"
                if fraction.len() != 3 || mixed {
                    return None;
                }
                format!("{digits}{fraction}")
            } else if fraction.len() == 3 && !mixed && digits.len() <= 3 && !digits.starts_with('0') {
                return None;
            } else {
                format!("{digits}.{fraction}")
            }
        }
    };

    let value: f64 = normalized.parse().ok()?;
    Some(if negative { -value } else { value })
}

mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => super::parse_timestamp(text)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("unrecognized receipt date: {text}"))),
        }
    }
}

/// Deserializers tolerant of `null`, blank strings and quoted numbers.
mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    use super::ExpenseCategory;

    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    pub fn category<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ExpenseCategory>, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?
            .as_deref()
            .and_then(ExpenseCategory::parse))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Float(f64),
        Text(String),
    }

    pub fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Option::<Number>::deserialize(deserializer)? {
            None => Ok(0.0),
            Some(Number::Float(value)) => Ok(value),
            Some(Number::Text(text)) => {
                if !text.chars().any(|c| c.is_ascii_digit()) {
                    return Ok(0.0);
                }
                super::parse_amount(&text)
                    .ok_or_else(|| D::Error::custom(format!("ambiguous amount: {text}")))
            }
        }
    }

    pub fn confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        amount(deserializer).map(|value| value.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn sample_record() -> ReceiptRecord {
        ReceiptRecord {
            store_name: "Corner Market".to_string(),
            receipt_date: Some(Utc.with_ymd_and_hms(2024, 3, 9, 18, 42, 0).unwrap()),
            total_amount: 23.47,
            currency: "USD".to_string(),
            items: vec![
                ReceiptLineItem::new("Oat milk", 4.29),
                ReceiptLineItem {
                    name: "Bananas".to_string(),
                    quantity: 1.35,
                    unit_price: 0.69,
                    total_price: 0.93,
                    category: Some("produce".to_string()),
                    ..ReceiptLineItem::default()
                },
            ],
            tax_amount: 1.52,
            subtotal_amount: 21.95,
            payment_method: Some("VISA".to_string()),
            card_last_digits: Some("4242".to_string()),
            expense_category: Some(ExpenseCategory::Food),
            custom_fields: BTreeMap::from([("loyalty_id".to_string(), "A-17".to_string())]),
            confidence_level: 0.92,
            ..ReceiptRecord::default()
        }
    }

    #[test]
    fn test_json_round_trip() {
        let record = sample_record();
        let json = record.to_json().unwrap();
        let decoded = ReceiptRecord::from_json(&json).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_timestamp_written_as_utc_rfc3339() {
        let json = sample_record().to_json().unwrap();
        assert!(json.contains(r#""receipt_date":"2024-03-09T18:42:00Z""#));
    }

    #[test]
    fn test_nulls_and_blanks_fall_back_to_defaults() {
        let json = r#"{
            "store_name": null,
            "total_amount": null,
            "currency": "EUR",
            "items": null,
            "store_phone": "",
            "tax_amount": null,
            "expense_category": "",
            "receipt_date": null
        }"#;

        let record = ReceiptRecord::from_json(json).unwrap();
        assert_eq!(record.store_name, "");
        assert_eq!(record.total_amount, 0.0);
        assert!(record.items.is_empty());
        assert_eq!(record.store_phone.as_deref(), Some(""));
        assert_eq!(record.expense_category, None);
        assert_eq!(record.receipt_date, None);
    }

    #[test]
    fn test_edge_values_round_trip() {
        let record = ReceiptRecord {
            payment_method: Some(String::new()),
            notes: Some("  ".to_string()),
            expense_category: ExpenseCategory::parse("Pets"),
            items: vec![ReceiptLineItem {
                sku: Some(String::new()),
                ..ReceiptLineItem::new("Kibble", 12.5)
            }],
            ..ReceiptRecord::default()
        };
        let decoded = ReceiptRecord::from_json(&record.to_json().unwrap()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_quoted_amounts_are_parsed() {
        let record = ReceiptRecord::from_json(r#"{"total_amount": "$1,250.50"}"#).unwrap();
        assert_eq!(record.total_amount, 1250.50);

        let record = ReceiptRecord::from_json(r#"{"total_amount": "1.250,50 EUR"}"#).unwrap();
        assert_eq!(record.total_amount, 1250.50);
    }

    #[test]
    fn test_parse_amount_separators() {
        assert_eq!(parse_amount("12,50"), Some(12.5));
        assert_eq!(parse_amount("12.50"), Some(12.5));
        assert_eq!(parse_amount("1.250,50"), Some(1250.5));
        assert_eq!(parse_amount("1,250.50"), Some(1250.5));
        assert_eq!(parse_amount("1 250,5 zł"), Some(1250.5));
        assert_eq!(parse_amount("1,250,000"), Some(1_250_000.0));
        assert_eq!(parse_amount("0.125"), Some(0.125));
        assert_eq!(parse_amount("Rs. 100"), Some(100.0));
        assert_eq!(parse_amount("-3,99"), Some(-3.99));
        assert_eq!(parse_amount("4500"), Some(4500.0));
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn test_ambiguous_amounts_are_rejected() {
        assert_eq!(parse_amount("1,250"), None);
        assert_eq!(parse_amount("1.250"), None);
        assert_eq!(parse_amount("1,250,50"), None);
        assert!(ReceiptRecord::from_json(r#"{"total_amount": "1,250"}"#).is_err());
    }

    #[test]
    fn test_amount_without_digits_is_zero() {
        let record = ReceiptRecord::from_json(r#"{"tax_amount": "-"}"#).unwrap();
        assert_eq!(record.tax_amount, 0.0);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let record = ReceiptRecord::from_json(r#"{"confidence_level": 7}"#).unwrap();
        assert_eq!(record.confidence_level, 1.0);
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01 12:30"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-01-01"),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("01/02/2024"), None);
    }

    #[test]
    fn test_bad_date_is_a_decode_error() {
        assert!(ReceiptRecord::from_json(r#"{"receipt_date": "yesterday"}"#).is_err());
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(ExpenseCategory::parse("food"), Some(ExpenseCategory::Food));
        assert_eq!(ExpenseCategory::parse("Household Items"), Some(ExpenseCategory::Household));
        assert_eq!(ExpenseCategory::parse("교통비"), Some(ExpenseCategory::Transportation));
        assert_eq!(ExpenseCategory::parse("  "), None);
        let pets = ExpenseCategory::parse(" Pets ").unwrap();
        assert!(matches!(&pets, ExpenseCategory::Unrecognized(label) if label.as_str() == "Pets"));
        assert_eq!(pets.key(), "Pets");
    }

    #[test]
    fn test_known_labels_never_stay_unrecognized() {
        for label in ["Food", "FOOD", "Culture/Leisure", "기타"] {
            let category = ExpenseCategory::parse(label).unwrap();
            assert!(!matches!(category, ExpenseCategory::Unrecognized(_)), "{label}");
        }
    }

    #[test]
    fn test_category_serializes_as_key() {
        let json = serde_json::to_string(&ExpenseCategory::CultureLeisure).unwrap();
        assert_eq!(json, r#""culture_leisure""#);
    }
}
