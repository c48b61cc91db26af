//! Placeholder data shown when the backend cannot be reached.

use chrono::{NaiveDate, NaiveTime, TimeDelta};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::types::{MonitoringRecord, Organization, RecordFields, NORMAL_SENTINEL};

pub const DEFAULT_MOCK_RECORD_COUNT: usize = 147;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const VIOLATION_PROBABILITY: f64 = 0.2;
const MINUTES_PER_DAY: i64 = 24 * 60;

const ALERT_TYPES: [&str; 5] = ["超速行驶", "疲劳驾驶", "接打电话", "未系安全带", "设备遮挡"];
const DRIVER_NAMES: [&str; 8] = ["张三", "李四", "王五", "赵六", "陈七", "刘八", "周九", "吴十"];
const LOCATIONS: [&str; 5] = [
    "广东省江门市江海区外海街道",
    "广东省江门市新会区三江镇",
    "广东省江门市鹤山市沙坪街道",
    "广东省江门市蓬江区杜阮镇",
    "广东省江门市新会区双水镇",
];
const FLEET_NAMES: [&str; 5] = ["第一车队", "第二车队", "第三车队", "第四车队", "第五车队"];

pub struct MockGenerator {
    rng: ChaCha8Rng,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    pub fn with_seed(seed: u64) -> Self {
        MockGenerator {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Builds `count` records whose timestamps fall on `report_date`.
    pub fn generate(&mut self, report_date: NaiveDate, count: usize) -> Vec<MonitoringRecord> {
        (1..=count)
            .map(|id| self.record(id, report_date))
            .collect()
    }

    fn record(&mut self, id: usize, report_date: NaiveDate) -> MonitoringRecord {
        let rng = &mut self.rng;
        let violation = rng.random_bool(VIOLATION_PROBABILITY);
        let (record_content, processing_status) = if violation {
            let alert = ALERT_TYPES[rng.random_range(0..ALERT_TYPES.len())];
            (format!("{alert}，已记录违规行为"), "处理中")
        } else {
            (NORMAL_SENTINEL.to_string(), "无需处理")
        };

        let day_start = report_date.and_time(NaiveTime::MIN);
        let departure_minute = rng.random_range(0..MINUTES_PER_DAY);
        let arrival_minute =
            (departure_minute + rng.random_range(10..=240)).min(MINUTES_PER_DAY - 1);
        let departure = day_start + TimeDelta::minutes(departure_minute);
        let arrival = day_start + TimeDelta::minutes(arrival_minute);

        MonitoringRecord::from(RecordFields {
            id: id.to_string(),
            vehicle_number: format!("粤J{}", rng.random_range(10000..100000)),
            driver_name: DRIVER_NAMES[rng.random_range(0..DRIVER_NAMES.len())].to_string(),
            start_location: LOCATIONS[rng.random_range(0..LOCATIONS.len())].to_string(),
            departure_time: departure.format(TIMESTAMP_FORMAT).to_string(),
            destination: LOCATIONS[rng.random_range(0..LOCATIONS.len())].to_string(),
            route: format!("S{}省道", rng.random_range(100..1000)),
            speed: format!("{:.1}", rng.random_range(40.0..100.0)),
            arrival_time: arrival.format(TIMESTAMP_FORMAT).to_string(),
            mileage: format!("{:.2}", rng.random_range(50.0..200.0)),
            record_content,
            processing_status: processing_status.to_string(),
        })
    }
}

/// Fleets offered in the selector when the organization listing fails.
pub fn mock_organizations() -> Vec<Organization> {
    FLEET_NAMES
        .iter()
        .enumerate()
        .map(|(idx, name)| Organization {
            id: (idx + 1).to_string(),
            name: name.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 23).unwrap()
    }

    #[test]
    fn generates_requested_number_of_records() {
        let records = MockGenerator::with_seed(7).generate(date(), DEFAULT_MOCK_RECORD_COUNT);
        assert_eq!(records.len(), DEFAULT_MOCK_RECORD_COUNT);
        assert_eq!(records[0].id, "1");
        assert_eq!(records[146].id, "147");
    }

    #[test]
    fn timestamps_are_anchored_to_report_date() {
        let records = MockGenerator::with_seed(11).generate(date(), 50);
        for record in &records {
            assert!(record.departure_time.starts_with("2025-12-23 "));
            assert!(record.arrival_time.starts_with("2025-12-23 "));
            assert!(record.arrival_time >= record.departure_time);
        }
    }

    #[test]
    fn violation_flag_matches_content() {
        let records = MockGenerator::with_seed(3).generate(date(), 200);
        assert!(records.iter().any(|r| r.is_violation()));
        assert!(records.iter().any(|r| !r.is_violation()));
        for record in &records {
            assert_eq!(
                record.is_violation(),
                record.record_content() != NORMAL_SENTINEL
            );
            let speed: f64 = record.speed.parse().unwrap();
            assert!((40.0..=100.0).contains(&speed));
            assert!(record.vehicle_number.starts_with("粤J"));
        }
    }

    #[test]
    fn same_seed_same_batch() {
        let a = MockGenerator::with_seed(42).generate(date(), 10);
        let b = MockGenerator::with_seed(42).generate(date(), 10);
        assert_eq!(a, b);
    }

    #[test]
    fn mock_organizations_are_numbered() {
        let orgs = mock_organizations();
        assert_eq!(orgs.len(), 5);
        assert_eq!(orgs[0].id, "1");
        assert_eq!(orgs[4].name, "第五车队");
    }
}
