use serde::{Deserialize, Serialize};

use crate::domain::{ResaleDataset, ResaleRecord};

/// Request-scoped filter selection. Empty lists and `None` ranges mean "no
/// constraint"; callers build one per query and receive an owned result,
/// there is no ambient filter state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    pub year_range: Option<(i32, i32)>,
    pub months: Vec<String>,
    pub towns: Vec<String>,
    pub flat_types: Vec<String>,
    pub storey_ranges: Vec<String>,
    pub flat_models: Vec<String>,
    pub floor_area_sqm: Option<(f64, f64)>,
    pub lease_commence_date: Option<(i64, i64)>,
    pub remaining_lease: Option<(i64, i64)>,
    pub resale_price: Option<(f64, f64)>,
}

pub fn apply(dataset: &ResaleDataset, params: &FilterParams) -> ResaleDataset {
    let records = dataset
        .records()
        .iter()
        .filter(|record| matches(record, params))
        .cloned()
        .collect();
    ResaleDataset::new(records)
}

fn matches(record: &ResaleRecord, params: &FilterParams) -> bool {
    if let Some((start, end)) = params.year_range {
        match transaction_year(&record.month) {
            Some(year) if year >= start && year <= end => {}
            _ => return false,
        }
    }
    if !params.months.is_empty() && !params.months.iter().any(|month| *month == record.month) {
        return false;
    }
    if !params.towns.is_empty() && !params.towns.iter().any(|town| *town == record.town) {
        return false;
    }
    if !params.flat_types.is_empty()
        && !params
            .flat_types
            .iter()
            .any(|flat_type| *flat_type == record.flat_type)
    {
        return false;
    }
    if !params.storey_ranges.is_empty()
        && !params
            .storey_ranges
            .iter()
            .any(|range| *range == record.storey_range)
    {
        return false;
    }
    if !params.flat_models.is_empty()
        && !params
            .flat_models
            .iter()
            .any(|model| *model == record.flat_model)
    {
        return false;
    }
    if let Some((low, high)) = params.floor_area_sqm
        && !(record.floor_area_sqm >= low && record.floor_area_sqm <= high)
    {
        return false;
    }
    if let Some((low, high)) = params.lease_commence_date
        && !(record.lease_commence_date >= low && record.lease_commence_date <= high)
    {
        return false;
    }
    if let Some((low, high)) = params.remaining_lease
        && !(record.remaining_lease >= low && record.remaining_lease <= high)
    {
        return false;
    }
    if let Some((low, high)) = params.resale_price
        && !(record.resale_price >= low && record.resale_price <= high)
    {
        return false;
    }
    true
}

/// Year prefix of a `YYYY-MM` month; `None` for the "Unknown" sentinel.
pub fn transaction_year(month: &str) -> Option<i32> {
    month.get(..4)?.parse().ok()
}

/// Min/max envelope of the dataset's filterable columns, the bounds a
/// presentation layer would seed its range inputs with. `None` for an empty
/// dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DatasetBounds {
    pub years: (i32, i32),
    pub floor_area_sqm: (f64, f64),
    pub lease_commence_date: (i64, i64),
    pub remaining_lease: (i64, i64),
    pub resale_price: (f64, f64),
}

impl DatasetBounds {
    pub fn of(dataset: &ResaleDataset) -> Option<Self> {
        let mut records = dataset.records().iter();
        let first = records.next()?;
        let first_year = transaction_year(&first.month);
        let mut bounds = Self {
            years: match first_year {
                Some(year) => (year, year),
                None => (0, 0),
            },
            floor_area_sqm: (first.floor_area_sqm, first.floor_area_sqm),
            lease_commence_date: (first.lease_commence_date, first.lease_commence_date),
            remaining_lease: (first.remaining_lease, first.remaining_lease),
            resale_price: (first.resale_price, first.resale_price),
        };
        let mut saw_year = first_year.is_some();
        for record in records {
            if let Some(year) = transaction_year(&record.month) {
                if !saw_year {
                    bounds.years = (year, year);
                    saw_year = true;
                } else {
                    bounds.years.0 = bounds.years.0.min(year);
                    bounds.years.1 = bounds.years.1.max(year);
                }
            }
            bounds.floor_area_sqm.0 = bounds.floor_area_sqm.0.min(record.floor_area_sqm);
            bounds.floor_area_sqm.1 = bounds.floor_area_sqm.1.max(record.floor_area_sqm);
            bounds.lease_commence_date.0 =
                bounds.lease_commence_date.0.min(record.lease_commence_date);
            bounds.lease_commence_date.1 =
                bounds.lease_commence_date.1.max(record.lease_commence_date);
            bounds.remaining_lease.0 = bounds.remaining_lease.0.min(record.remaining_lease);
            bounds.remaining_lease.1 = bounds.remaining_lease.1.max(record.remaining_lease);
            bounds.resale_price.0 = bounds.resale_price.0.min(record.resale_price);
            bounds.resale_price.1 = bounds.resale_price.1.max(record.resale_price);
        }
        Some(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(month: &str, town: &str, flat_type: &str, price: f64) -> ResaleRecord {
        ResaleRecord {
            month: month.to_string(),
            town: town.to_string(),
            flat_type: flat_type.to_string(),
            block: "309".to_string(),
            street_name: "ANG MO KIO AVE 1".to_string(),
            storey_range: "07 TO 09".to_string(),
            floor_area_sqm: 92.0,
            flat_model: "IMPROVED".to_string(),
            lease_commence_date: 1978,
            remaining_lease: 53,
            resale_price: price,
        }
    }

    fn dataset() -> ResaleDataset {
        ResaleDataset::new(vec![
            record("2024-01", "ANG MO KIO", "4 ROOM", 468000.0),
            record("2023-06", "BEDOK", "5 ROOM", 610000.0),
            record("1999-12", "BEDOK", "3 ROOM", 180000.0),
        ])
    }

    #[test]
    fn default_params_keep_everything() {
        let data = dataset();
        let filtered = apply(&data, &FilterParams::default());
        assert_eq!(filtered, data);
    }

    #[test]
    fn filters_by_town_and_year_range() {
        let params = FilterParams {
            towns: vec!["BEDOK".to_string()],
            year_range: Some((2000, 2024)),
            ..FilterParams::default()
        };
        let filtered = apply(&dataset(), &params);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.records()[0].month, "2023-06");
    }

    #[test]
    fn filters_by_price_range() {
        let params = FilterParams {
            resale_price: Some((400000.0, 700000.0)),
            ..FilterParams::default()
        };
        let filtered = apply(&dataset(), &params);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn unknown_month_is_excluded_from_year_filter() {
        let mut records = dataset().into_records();
        records.push(record("Unknown", "YISHUN", "4 ROOM", 300000.0));
        let params = FilterParams {
            year_range: Some((1990, 2030)),
            ..FilterParams::default()
        };
        let filtered = apply(&ResaleDataset::new(records), &params);
        assert!(filtered.records().iter().all(|r| r.month != "Unknown"));
    }

    #[test]
    fn bounds_cover_all_columns() {
        let bounds = DatasetBounds::of(&dataset()).unwrap();
        assert_eq!(bounds.years, (1999, 2024));
        assert_eq!(bounds.resale_price, (180000.0, 610000.0));
    }

    #[test]
    fn bounds_of_empty_dataset_is_none() {
        assert_eq!(DatasetBounds::of(&ResaleDataset::default()), None);
    }
}
