//! Extraction instructions sent alongside the receipt image.

use crate::models::config::ServiceConfig;
use crate::models::outcome::ExtractionRequest;
use crate::models::receipt::ExpenseCategory;

/// JSON shape the endpoint must reply with.
const RESPONSE_SHAPE: &str = r#"{
  "store_name": "string",
  "receipt_date": "2024-01-01T12:00:00Z",
  "total_amount": 0.0,
  "currency": "USD",
  "items": [
    {
      "name": "string",
      "quantity": 1.0,
      "unit_price": 0.0,
      "total_price": 0.0,
      "category": "string",
      "sku": "string",
      "discount": 0.0,
      "tax_amount": 0.0,
      "description": "string"
    }
  ],
  "store_address": "string",
  "store_phone": "string",
  "tax_amount": 0.0,
  "subtotal_amount": 0.0,
  "discount_amount": 0.0,
  "tip_amount": 0.0,
  "payment_method": "string",
  "card_last_digits": "string",
  "receipt_number": "string",
  "transaction_id": "string",
  "cashier_name": "string",
  "register_number": "string",
  "expense_category": "food",
  "notes": "string",
  "confidence_level": 0.95
}"#;

/// Render the extraction prompt for a request.
///
/// Request-level currency and language win over the configured defaults.
pub fn build_extraction_prompt(request: &ExtractionRequest, config: &ServiceConfig) -> String {
    let currency = non_blank(&request.expected_currency).unwrap_or(&config.default_currency);
    let language = non_blank(&request.expected_language).unwrap_or(&config.default_language);

    let mut prompt = String::from(
        "You are an expert at extracting structured data from receipt images. \
         Analyze this receipt image and extract all available information in JSON format.\n\n",
    );

    prompt.push_str("Instructions:\n");
    prompt.push_str("1. Extract the receipt date and convert it to ISO 8601 format (YYYY-MM-DDTHH:MM:SSZ)\n");
    prompt.push_str("2. Extract all items with their names, quantities, unit prices, and total prices\n");
    prompt.push_str("3. Identify the store name, address, and phone number if visible\n");
    prompt.push_str("4. Extract the total amount, currency, tax, subtotal, discounts, and tips\n");
    prompt.push_str("5. Look for payment method, card last digits, receipt number, transaction ID, cashier name, register number\n");
    prompt.push_str("6. Extract any other relevant information you can find\n");
    prompt.push_str(&format!("7. If the currency is not visible, assume: {currency}\n"));
    prompt.push_str(&format!(
        "8. The receipt may be in: {language} (or other languages - detect automatically)\n"
    ));
    prompt.push_str(&format!(
        "9. If the receipt prints a time without a timezone, assume: {}\n",
        config.default_timezone
    ));
    prompt.push_str("10. Be precise with numbers and dates\n");
    prompt.push_str("11. If information is unclear or not visible, omit that field or set it to null\n\n");

    prompt.push_str("12. Classify the receipt into ONE expense category for household budget tracking:\n");
    for category in ExpenseCategory::ALL.iter() {
        prompt.push_str(&format!(
            "   - \"{}\" ({}) - {}\n",
            category.key(),
            category.label(),
            category.examples()
        ));
    }

    prompt.push_str("\nReturn ONLY a valid JSON object matching this structure:\n");
    prompt.push_str(RESPONSE_SHAPE);
    prompt.push_str(
        "\n\nDo not include any markdown formatting, explanations, or text outside the JSON object.",
    );

    if let Some(store) = non_blank(&request.store_hint) {
        prompt.push_str(&format!("\n\nAdditional context: This receipt is likely from {store}"));
    }

    prompt
}

fn non_blank(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::outcome::ImageInput;

    fn request() -> ExtractionRequest {
        ExtractionRequest::new(ImageInput::Url("https://example.com/r.jpg".to_string()))
    }

    #[test]
    fn test_config_defaults_fill_missing_hints() {
        let prompt = build_extraction_prompt(&request(), &ServiceConfig::default());
        assert!(prompt.contains("assume: USD"));
        assert!(prompt.contains("may be in: en"));
        assert!(prompt.contains("assume: UTC"));
        assert!(!prompt.contains("Additional context"));
    }

    #[test]
    fn test_request_overrides_win() {
        let mut req = request();
        req.expected_currency = Some("KRW".to_string());
        req.expected_language = Some("ko".to_string());
        req.store_hint = Some("GS25".to_string());

        let prompt = build_extraction_prompt(&req, &ServiceConfig::default());
        assert!(prompt.contains("assume: KRW"));
        assert!(prompt.contains("may be in: ko"));
        assert!(prompt.ends_with("Additional context: This receipt is likely from GS25"));
    }

    #[test]
    fn test_lists_all_eight_categories_and_schema() {
        let prompt = build_extraction_prompt(&request(), &ServiceConfig::default());
        for category in ExpenseCategory::ALL.iter() {
            assert!(prompt.contains(&format!("\"{}\"", category.key())));
        }
        assert!(prompt.contains("\"confidence_level\": 0.95"));
        assert!(prompt.contains("ONE expense category"));
    }
}
