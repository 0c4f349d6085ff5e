//! Extraction prompt for identity-document pages.
//!
//! The prompt is fixed apart from two substitutions: today's date (so the
//! model can flag expired documents and implausible birth dates) and, for
//! PDF pages, the page number. The JSON schema it asks for is the shape
//! decoded by [`crate::output::ExtractionResult`]; keep the two in sync.

use chrono::NaiveDate;

/// Output schema embedded verbatim in every prompt.
pub const OUTPUT_SCHEMA: &str = r#"{
  "document_type": "passport | national_id | driving_license | other",
  "extracted_sections": {
    "<Heading or Section Name>": {
      "<Field Label>": "<Value or null>"
    }
  },
  "inconsistencies": ["string"],
  "confidence_indication": "high | medium | low"
}"#;

/// Build the instruction text for one page.
///
/// `page_index` is 0-based; `None` means the upload was a single image.
pub fn extraction_prompt(today: NaiveDate, page_index: Option<usize>) -> String {
    let page_context = page_index
        .map(|i| format!(" (Page {})", i + 1))
        .unwrap_or_default();

    format!(
        r#"You are a LegalTech AI specialized in identity document understanding.

TODAY'S DATE: {today}

YOUR TASK:
1. Read the entire document image{page_context} (OCR internally).
2. Identify DOCUMENT TYPE strictly as:
   ["passport", "national_id", "driving_license", "other"]

3. Extract ALL visible information:
   - Names
   - Numbers
   - Dates
   - Addresses
   - Authorities
   - Codes
   - Machine-readable zones
   - Any labeled data

4. Structure output by DOCUMENT HEADINGS or logical sections.

5. Normalize dates to YYYY-MM-DD when possible.
6. Use null if unreadable.
7. Identify inconsistencies.

OUTPUT STRICT JSON ONLY.

REQUIRED JSON FORMAT:
{OUTPUT_SCHEMA}

RULES:
- Do not invent fields
- No explanations
- No markdown"#,
        today = today.format("%Y-%m-%d"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 30).unwrap()
    }

    #[test]
    fn embeds_date_and_schema() {
        let p = extraction_prompt(day(), None);
        assert!(p.contains("TODAY'S DATE: 2026-01-30"));
        assert!(p.contains(OUTPUT_SCHEMA));
        assert!(p.contains("OUTPUT STRICT JSON ONLY."));
    }

    #[test]
    fn page_context_is_one_indexed() {
        let p = extraction_prompt(day(), Some(1));
        assert!(p.contains("document image (Page 2) (OCR internally)"));
    }

    #[test]
    fn image_upload_has_no_page_context() {
        let p = extraction_prompt(day(), None);
        assert!(p.contains("document image (OCR internally)"));
        assert!(!p.contains("(Page"));
    }
}
