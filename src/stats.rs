use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{ResaleDataset, ResaleRecord};
use crate::filter::transaction_year;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AveragePrice {
    pub label: String,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearAverage {
    pub year: i32,
    pub average: f64,
}

/// Mean resale price per town, highest first.
pub fn average_price_by_town(dataset: &ResaleDataset) -> Vec<AveragePrice> {
    averages_by(dataset, |record| &record.town)
}

/// Mean resale price per flat type, highest first.
pub fn average_price_by_flat_type(dataset: &ResaleDataset) -> Vec<AveragePrice> {
    averages_by(dataset, |record| &record.flat_type)
}

/// Mean resale price per transaction year, ascending. Rows whose month is
/// the "Unknown" sentinel carry no year and are left out of the series.
pub fn average_price_by_year(dataset: &ResaleDataset) -> Vec<YearAverage> {
    let mut sums: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for record in dataset.records() {
        if let Some(year) = transaction_year(&record.month) {
            let entry = sums.entry(year).or_default();
            entry.0 += record.resale_price;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(year, (sum, count))| YearAverage {
            year,
            average: sum / count as f64,
        })
        .collect()
}

fn averages_by(
    dataset: &ResaleDataset,
    key: impl Fn(&ResaleRecord) -> &str,
) -> Vec<AveragePrice> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for record in dataset.records() {
        let entry = sums.entry(key(record).to_string()).or_default();
        entry.0 += record.resale_price;
        entry.1 += 1;
    }
    let mut averages: Vec<AveragePrice> = sums
        .into_iter()
        .map(|(label, (sum, count))| AveragePrice {
            label,
            average: sum / count as f64,
        })
        .collect();
    averages.sort_by(|a, b| {
        b.average
            .partial_cmp(&a.average)
            .unwrap_or(Ordering::Equal)
    });
    averages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(month: &str, town: &str, flat_type: &str, price: f64) -> ResaleRecord {
        ResaleRecord {
            month: month.to_string(),
            town: town.to_string(),
            flat_type: flat_type.to_string(),
            block: "1".to_string(),
            street_name: "MAIN ST".to_string(),
            storey_range: "01 TO 03".to_string(),
            floor_area_sqm: 90.0,
            flat_model: "IMPROVED".to_string(),
            lease_commence_date: 1990,
            remaining_lease: 60,
            resale_price: price,
        }
    }

    fn dataset() -> ResaleDataset {
        ResaleDataset::new(vec![
            record("2024-01", "ANG MO KIO", "4 ROOM", 400000.0),
            record("2024-02", "ANG MO KIO", "4 ROOM", 500000.0),
            record("2024-03", "BEDOK", "5 ROOM", 700000.0),
            record("2023-01", "BEDOK", "5 ROOM", 600000.0),
        ])
    }

    #[test]
    fn town_averages_sorted_descending() {
        let averages = average_price_by_town(&dataset());
        assert_eq!(averages.len(), 2);
        assert_eq!(averages[0].label, "BEDOK");
        assert_eq!(averages[0].average, 650000.0);
        assert_eq!(averages[1].label, "ANG MO KIO");
        assert_eq!(averages[1].average, 450000.0);
    }

    #[test]
    fn flat_type_averages() {
        let averages = average_price_by_flat_type(&dataset());
        assert_eq!(averages[0].label, "5 ROOM");
        assert_eq!(averages[1].label, "4 ROOM");
    }

    #[test]
    fn year_series_ascending_and_skips_unknown() {
        let mut records = dataset().into_records();
        records.push(record("Unknown", "YISHUN", "3 ROOM", 100000.0));
        let series = average_price_by_year(&ResaleDataset::new(records));
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].year, 2023);
        assert_eq!(series[1].year, 2024);
        assert_eq!(series[1].average, (400000.0 + 500000.0 + 700000.0) / 3.0);
    }

    #[test]
    fn empty_dataset_yields_empty_series() {
        assert!(average_price_by_town(&ResaleDataset::default()).is_empty());
        assert!(average_price_by_year(&ResaleDataset::default()).is_empty());
    }
}
