//! Merge per-page extraction results into one document-level result.
//!
//! Merge policy:
//!
//! | Field | Multi-page rule |
//! |-------|-----------------|
//! | `document_type` | taken from page 1 |
//! | `extracted_sections` | union per section; later pages overwrite same-named fields |
//! | `inconsistencies` | concatenated in page order, duplicates kept |
//! | `confidence_indication` | always `medium` |
//!
//! Confidence is not derived from the pages.

use crate::output::{AggregateResult, Confidence, ExtractionResult, PageResult, Sections};

/// Combine ordered page results into the response payload.
///
/// Returns `None` for an empty slice. A single page is returned verbatim
/// (including any `raw_output`) with `total_pages = 1`.
pub fn aggregate(pages: Vec<PageResult>) -> Option<AggregateResult> {
    match pages.len() {
        0 => None,
        1 => pages
            .into_iter()
            .next()
            .map(|page| AggregateResult::single(page.result)),
        total => {
            let merged = ExtractionResult {
                document_type: pages[0].result.document_type,
                extracted_sections: merge_sections(&pages),
                inconsistencies: pages
                    .iter()
                    .flat_map(|p| p.result.inconsistencies.iter().cloned())
                    .collect(),
                confidence_indication: Confidence::Medium,
                raw_output: None,
            };
            Some(AggregateResult {
                result: merged,
                total_pages: total,
                pages: Some(pages),
            })
        }
    }
}

/// Union sections across pages; page N's fields win over pages < N.
fn merge_sections(pages: &[PageResult]) -> Sections {
    let mut merged = Sections::new();
    for page in pages {
        for (section, fields) in &page.result.extracted_sections {
            let target = merged.entry(section.clone()).or_default();
            for (label, value) in fields {
                target.insert(label.clone(), value.clone());
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{DocumentType, SectionFields};
    use serde_json::json;

    fn page(n: usize, result: ExtractionResult) -> PageResult {
        PageResult {
            page_number: n,
            result,
        }
    }

    fn sections(v: serde_json::Value) -> Sections {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn empty_input_has_no_aggregate() {
        assert!(aggregate(vec![]).is_none());
    }

    #[test]
    fn single_page_is_returned_verbatim() {
        let only = ExtractionResult {
            document_type: DocumentType::NationalId,
            extracted_sections: sections(json!({"Card": {"Number": "X1"}})),
            inconsistencies: vec!["blurred photo".into()],
            confidence_indication: Confidence::High,
            raw_output: None,
        };
        let agg = aggregate(vec![page(1, only.clone())]).unwrap();
        assert_eq!(agg.result, only);
        assert_eq!(agg.total_pages, 1);
        assert!(agg.pages.is_none());
    }

    #[test]
    fn single_fallback_page_keeps_raw_output() {
        let agg = aggregate(vec![page(1, ExtractionResult::parse_failure("oops"))]).unwrap();
        assert_eq!(agg.result.raw_output.as_deref(), Some("oops"));
    }

    #[test]
    fn later_pages_overwrite_fields_and_keep_the_rest() {
        let p1 = ExtractionResult {
            extracted_sections: sections(json!({"A": {"x": "1"}})),
            ..Default::default()
        };
        let p2 = ExtractionResult {
            extracted_sections: sections(json!({"A": {"x": "2", "y": "3"}})),
            ..Default::default()
        };
        let agg = aggregate(vec![page(1, p1), page(2, p2)]).unwrap();
        assert_eq!(
            agg.result.extracted_sections,
            sections(json!({"A": {"x": "2", "y": "3"}}))
        );

        let p1 = ExtractionResult {
            extracted_sections: sections(json!({"A": {"x": "1", "z": "9"}, "B": {"k": null}})),
            ..Default::default()
        };
        let p2 = ExtractionResult {
            extracted_sections: sections(json!({"A": {"x": "2"}})),
            ..Default::default()
        };
        let agg = aggregate(vec![page(1, p1), page(2, p2)]).unwrap();
        let a: &SectionFields = &agg.result.extracted_sections["A"];
        assert_eq!(a["x"], json!("2"));
        assert_eq!(a["z"], json!("9"));
        assert!(agg.result.extracted_sections["B"]["k"].is_null());
    }

    #[test]
    fn inconsistencies_are_concatenated_in_page_order() {
        let mk = |notes: &[&str]| ExtractionResult {
            inconsistencies: notes.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        let agg = aggregate(vec![
            page(1, mk(&["dup", "a"])),
            page(2, mk(&[])),
            page(3, mk(&["dup"])),
        ])
        .unwrap();
        assert_eq!(agg.result.inconsistencies, vec!["dup", "a", "dup"]);
        assert_eq!(agg.total_pages, 3);
    }

    #[test]
    fn multi_page_confidence_is_always_medium_and_type_from_first_page() {
        let p1 = ExtractionResult {
            document_type: DocumentType::Passport,
            confidence_indication: Confidence::High,
            ..Default::default()
        };
        let p2 = ExtractionResult {
            document_type: DocumentType::DrivingLicense,
            confidence_indication: Confidence::High,
            ..Default::default()
        };
        let agg = aggregate(vec![page(1, p1), page(2, p2)]).unwrap();
        assert_eq!(agg.result.confidence_indication, Confidence::Medium);
        assert_eq!(agg.result.document_type, DocumentType::Passport);

        let low = aggregate(vec![
            page(1, ExtractionResult::parse_failure("x")),
            page(2, ExtractionResult::parse_failure("y")),
        ])
        .unwrap();
        assert_eq!(low.result.confidence_indication, Confidence::Medium);
        assert!(low.result.raw_output.is_none());
    }

    #[test]
    fn multi_page_keeps_every_page_in_order() {
        let agg = aggregate(vec![
            page(1, ExtractionResult::default()),
            page(2, ExtractionResult::parse_failure("raw")),
        ])
        .unwrap();
        let pages = agg.pages.unwrap();
        assert_eq!(pages.iter().map(|p| p.page_number).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(pages[1].result.raw_output.as_deref(), Some("raw"));
    }
}
