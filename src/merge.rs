use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{Fragment, RawRecord, ResaleDataset, ResaleRecord};
use crate::error::ResaleError;

/// Sentinel for missing text fields.
pub const TEXT_SENTINEL: &str = "Unknown";
/// Sentinel for missing numeric fields, as text so the fill stage can run
/// before any coercion.
const NUMERIC_SENTINEL: &str = "-1";

/// Concatenates fragments (in listed order, preserving per-fragment row
/// order) and normalizes the result into the unified table: default-fill,
/// lease derivation, label normalization, type coercion, then a stable sort
/// by transaction month descending.
///
/// `current_year` feeds the remaining-lease fallback; the caller samples the
/// clock once per acquisition so normalization itself stays pure.
pub fn merge_fragments(
    fragments: &[Fragment],
    current_year: i32,
) -> Result<ResaleDataset, ResaleError> {
    let capacity = fragments.iter().map(|fragment| fragment.rows.len()).sum();
    let mut records = Vec::with_capacity(capacity);
    for fragment in fragments {
        for raw in &fragment.rows {
            records.push(normalize_row(raw, current_year)?);
        }
    }
    records.sort_by(|a, b| b.month.cmp(&a.month));
    Ok(ResaleDataset::new(records))
}

fn normalize_row(raw: &RawRecord, current_year: i32) -> Result<ResaleRecord, ResaleError> {
    // Fill runs strictly before coercion: no null reaches a parse below.
    let month = fill_text(&raw.month);
    let town = fill_text(&raw.town);
    let flat_type = fill_text(&raw.flat_type).replace('-', " ");
    let block = fill_text(&raw.block);
    let street_name = fill_text(&raw.street_name);
    let storey_range = fill_text(&raw.storey_range);
    let flat_model = match &raw.flat_model {
        Some(value) => value.to_uppercase(),
        None => TEXT_SENTINEL.to_string(),
    };

    let floor_area_sqm = coerce_f64("floor_area_sqm", &fill_numeric(&raw.floor_area_sqm))?;
    let lease_commence_date =
        coerce_i64("lease_commence_date", &fill_numeric(&raw.lease_commence_date))?;
    // Prefer the dataset's own lease text; fall back to the 99-year-lease
    // formula when the column is absent or the cell is empty.
    let remaining_lease = match &raw.remaining_lease {
        Some(value) => lease_years(value)?,
        None => 100 - (i64::from(current_year) - lease_commence_date),
    };
    let resale_price = coerce_f64("resale_price", &fill_numeric(&raw.resale_price))?;

    Ok(ResaleRecord {
        month,
        town,
        flat_type,
        block,
        street_name,
        storey_range,
        floor_area_sqm,
        flat_model,
        lease_commence_date,
        remaining_lease,
        resale_price,
    })
}

fn fill_text(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| TEXT_SENTINEL.to_string())
}

fn fill_numeric(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| NUMERIC_SENTINEL.to_string())
}

fn coerce_f64(column: &'static str, value: &str) -> Result<f64, ResaleError> {
    value.parse::<f64>().map_err(|_| ResaleError::Coercion {
        column,
        value: value.to_string(),
    })
}

fn coerce_i64(column: &'static str, value: &str) -> Result<i64, ResaleError> {
    value.parse::<i64>().map_err(|_| ResaleError::Coercion {
        column,
        value: value.to_string(),
    })
}

/// Whole-year count from the dataset's lease text: "61 years 04 months"
/// parses to 61, a bare "61" stays 61.
fn lease_years(value: &str) -> Result<i64, ResaleError> {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| Regex::new(r"^\s*(-?\d+)").unwrap());
    prefix
        .captures(value)
        .and_then(|captures| captures.get(1))
        .and_then(|years| years.as_str().parse::<i64>().ok())
        .ok_or_else(|| ResaleError::Coercion {
            column: "remaining_lease",
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::DatasetId;

    fn fragment(dataset_id: &str, rows: Vec<RawRecord>) -> Fragment {
        Fragment {
            dataset_id: dataset_id.parse::<DatasetId>().unwrap(),
            rows,
        }
    }

    fn full_row(month: &str) -> RawRecord {
        RawRecord {
            month: Some(month.to_string()),
            town: Some("ANG MO KIO".to_string()),
            flat_type: Some("4 ROOM".to_string()),
            block: Some("309".to_string()),
            street_name: Some("ANG MO KIO AVE 1".to_string()),
            storey_range: Some("07 TO 09".to_string()),
            floor_area_sqm: Some("92".to_string()),
            flat_model: Some("New Generation".to_string()),
            lease_commence_date: Some("1978".to_string()),
            remaining_lease: Some("53 years 10 months".to_string()),
            resale_price: Some("468000".to_string()),
        }
    }

    #[test]
    fn row_count_is_sum_of_fragment_row_counts() {
        let fragments = vec![
            fragment("d_a", vec![full_row("2020-01"), full_row("2020-02")]),
            fragment("d_b", vec![full_row("2021-07")]),
            fragment("d_c", Vec::new()),
        ];
        let dataset = merge_fragments(&fragments, 2025).unwrap();
        assert_eq!(dataset.len(), 3);
    }

    #[test]
    fn sorts_by_month_descending() {
        let fragments = vec![fragment(
            "d_a",
            vec![full_row("1999-05"), full_row("2024-11"), full_row("2003-01")],
        )];
        let dataset = merge_fragments(&fragments, 2025).unwrap();
        let months: Vec<&str> = dataset
            .records()
            .iter()
            .map(|record| record.month.as_str())
            .collect();
        assert_eq!(months, vec!["2024-11", "2003-01", "1999-05"]);
    }

    #[test]
    fn missing_price_fills_to_sentinel() {
        let mut row = full_row("2020-01");
        row.resale_price = None;
        let dataset = merge_fragments(&[fragment("d_a", vec![row])], 2025).unwrap();
        assert_eq!(dataset.records()[0].resale_price, -1.0);
    }

    #[test]
    fn missing_text_fields_fill_to_unknown() {
        let mut row = full_row("2020-01");
        row.town = None;
        row.flat_model = None;
        let dataset = merge_fragments(&[fragment("d_a", vec![row])], 2025).unwrap();
        assert_eq!(dataset.records()[0].town, "Unknown");
        assert_eq!(dataset.records()[0].flat_model, "Unknown");
    }

    #[test]
    fn lease_parses_numeric_prefix() {
        let row = full_row("2020-01");
        let dataset = merge_fragments(&[fragment("d_a", vec![row])], 2025).unwrap();
        assert_eq!(dataset.records()[0].remaining_lease, 53);
    }

    #[test]
    fn missing_lease_derives_from_commencement() {
        let mut row = full_row("2020-01");
        row.lease_commence_date = Some("1995".to_string());
        row.remaining_lease = None;
        let dataset = merge_fragments(&[fragment("d_a", vec![row])], 2025).unwrap();
        assert_eq!(dataset.records()[0].remaining_lease, 70);
    }

    #[test]
    fn flat_labels_are_normalized() {
        let mut row = full_row("2020-01");
        row.flat_type = Some("MULTI-GENERATION".to_string());
        row.flat_model = Some("Model A-Maisonette".to_string());
        let dataset = merge_fragments(&[fragment("d_a", vec![row])], 2025).unwrap();
        assert_eq!(dataset.records()[0].flat_type, "MULTI GENERATION");
        assert_eq!(dataset.records()[0].flat_model, "MODEL A-MAISONETTE");
    }

    #[test]
    fn unparseable_value_surfaces_column_and_value() {
        let mut row = full_row("2020-01");
        row.floor_area_sqm = Some("ninety-two".to_string());
        let err = merge_fragments(&[fragment("d_a", vec![row])], 2025).unwrap_err();
        assert_matches!(
            err,
            ResaleError::Coercion {
                column: "floor_area_sqm",
                ..
            }
        );
    }

    #[test]
    fn unparseable_lease_text_surfaces() {
        let mut row = full_row("2020-01");
        row.remaining_lease = Some("freehold".to_string());
        let err = merge_fragments(&[fragment("d_a", vec![row])], 2025).unwrap_err();
        assert_matches!(
            err,
            ResaleError::Coercion {
                column: "remaining_lease",
                ..
            }
        );
    }

    #[test]
    fn merge_of_no_fragments_is_empty() {
        let dataset = merge_fragments(&[], 2025).unwrap();
        assert!(dataset.is_empty());
    }
}
