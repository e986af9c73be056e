//! Lag buffer construction from caller-supplied history
//!
//! History rows may use canonical or short-form column names and may or may
//! not carry timestamps. The window normalizes them into exactly `n_lags`
//! rows, oldest first, and decides which instant the forecast is anchored to.

use crate::error::PipelineError;
use crate::models::{HistoryPoint, Sensor, SensorReading};
use chrono::{DateTime, FixedOffset};
use tracing::{debug, warn};

/// Canonical column name and accepted synonyms for each sensor
pub const SENSOR_ALIASES: [(Sensor, &[&str]); 3] = [
    (Sensor::Ph, &["water_pH", "pH", "ph"]),
    (Sensor::Turbidity, &["turbidity_ntu", "turbidity", "turb"]),
    (Sensor::Temperature, &["water_temp", "temperature", "temp", "water_temp_c"]),
];

/// Accepted column names for a sensor, canonical name first
pub fn accepted_names(sensor: Sensor) -> &'static [&'static str] {
    SENSOR_ALIASES
        .iter()
        .find(|(s, _)| *s == sensor)
        .map(|(_, names)| *names)
        .unwrap_or(&[])
}

/// Physical sensor a column name refers to, if any
pub fn resolve_sensor(column: &str) -> Option<Sensor> {
    SENSOR_ALIASES
        .iter()
        .find(|(_, names)| names.contains(&column))
        .map(|(sensor, _)| *sensor)
}

/// Read a sensor value from a history row, preferring the canonical name
fn lookup(point: &HistoryPoint, sensor: Sensor) -> Option<f64> {
    accepted_names(sensor)
        .iter()
        .find_map(|name| point.number(name))
}

/// One normalized buffer row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagRow {
    pub ph: f64,
    pub turbidity: f64,
    pub temperature: f64,
}

impl LagRow {
    pub fn get(&self, sensor: Sensor) -> f64 {
        match sensor {
            Sensor::Ph => self.ph,
            Sensor::Turbidity => self.turbidity,
            Sensor::Temperature => self.temperature,
        }
    }

    /// Resolve a history row through the alias table; `row` is its input index
    ///
    /// Resolved values must pass the same checks as a live reading.
    pub fn from_point(point: &HistoryPoint, row: usize) -> Result<Self, PipelineError> {
        let value = |sensor: Sensor| {
            lookup(point, sensor).ok_or_else(|| PipelineError::UnresolvableColumn {
                row,
                column: accepted_names(sensor)[0].to_string(),
                accepted: accepted_names(sensor).join(", "),
            })
        };
        let resolved = Self {
            ph: value(Sensor::Ph)?,
            turbidity: value(Sensor::Turbidity)?,
            temperature: value(Sensor::Temperature)?,
        };
        SensorReading::new(resolved.ph, resolved.turbidity, resolved.temperature)
            .validate()
            .map_err(|e| match e {
                PipelineError::InvalidInput(msg) => {
                    PipelineError::InvalidInput(format!("history row {}: {}", row, msg))
                }
                other => other,
            })?;
        Ok(resolved)
    }
}

impl From<&SensorReading> for LagRow {
    fn from(reading: &SensorReading) -> Self {
        Self {
            ph: reading.ph,
            turbidity: reading.turbidity_ntu,
            temperature: reading.water_temp_c,
        }
    }
}

/// Fixed-size lag buffer, oldest row first
#[derive(Debug, Clone, PartialEq)]
pub struct LagBuffer {
    rows: Vec<LagRow>,
    anchor: DateTime<FixedOffset>,
}

impl LagBuffer {
    pub fn rows(&self) -> &[LagRow] {
        &self.rows
    }

    /// Instant the forecast is anchored to
    pub fn anchor(&self) -> DateTime<FixedOffset> {
        self.anchor
    }

    /// Row `lag` steps back from the anchor; lag 1 is the newest row
    pub fn lag(&self, lag: usize) -> Option<&LagRow> {
        if lag == 0 || lag > self.rows.len() {
            return None;
        }
        self.rows.get(self.rows.len() - lag)
    }
}

/// Builds lag buffers of a fixed length
#[derive(Debug, Clone, Copy)]
pub struct HistoryWindow {
    n_lags: usize,
}

impl HistoryWindow {
    pub fn new(n_lags: usize) -> Self {
        Self { n_lags }
    }

    pub fn n_lags(&self) -> usize {
        self.n_lags
    }

    /// Normalize history into a lag buffer
    ///
    /// Without history the current reading is repeated `n_lags` times. With
    /// history, rows are resolved through the alias table, sorted by
    /// timestamp when every row has one, and tail-padded with the most
    /// recent row when too short.
    pub fn build(
        &self,
        history: Option<&[HistoryPoint]>,
        current: &SensorReading,
        now: DateTime<FixedOffset>,
    ) -> Result<LagBuffer, PipelineError> {
        let history = match history {
            Some(points) if !points.is_empty() => points,
            _ => {
                debug!(n_lags = self.n_lags, "No history, assuming steady state");
                return Ok(LagBuffer {
                    rows: vec![LagRow::from(current); self.n_lags],
                    anchor: current.timestamp.unwrap_or(now),
                });
            }
        };

        let mut rows = history
            .iter()
            .enumerate()
            .map(|(i, point)| LagRow::from_point(point, i).map(|row| (point.timestamp, row)))
            .collect::<Result<Vec<_>, PipelineError>>()?;

        let timestamped = rows.iter().filter(|(ts, _)| ts.is_some()).count();
        let mut anchor = now;
        if timestamped == rows.len() {
            // Stable sort keeps input order for equal instants
            rows.sort_by_key(|(ts, _)| *ts);
            if let Some(last) = rows.last().and_then(|(ts, _)| *ts) {
                anchor = last;
            }
        } else if timestamped > 0 {
            warn!(
                rows = rows.len(),
                timestamped,
                "History is partially timestamped, keeping input order"
            );
        }

        let mut rows: Vec<LagRow> = rows.into_iter().map(|(_, row)| row).collect();
        if let Some(&newest) = rows.last() {
            while rows.len() < self.n_lags {
                rows.push(newest);
            }
        }
        let start = rows.len() - self.n_lags;
        rows.drain(..start);

        debug!(
            history_rows = history.len(),
            n_lags = self.n_lags,
            anchor = %anchor,
            "Built lag buffer from history"
        );

        Ok(LagBuffer { rows, anchor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        ts("2024-05-06T12:00:00+07:00")
    }

    fn point(ph: f64, at: Option<&str>) -> HistoryPoint {
        HistoryPoint::new(at.map(ts))
            .with("ph", ph)
            .with("turbidity", 10.0)
            .with("temperature", 27.0)
    }

    #[test]
    fn test_alias_table_resolves_synonyms() {
        assert_eq!(resolve_sensor("water_pH"), Some(Sensor::Ph));
        assert_eq!(resolve_sensor("ph"), Some(Sensor::Ph));
        assert_eq!(resolve_sensor("turbidity"), Some(Sensor::Turbidity));
        assert_eq!(resolve_sensor("water_temp"), Some(Sensor::Temperature));
        assert_eq!(resolve_sensor("salinity"), None);
        assert_eq!(accepted_names(Sensor::Turbidity)[0], "turbidity_ntu");
    }

    #[test]
    fn test_canonical_name_wins_over_synonym() {
        let p = HistoryPoint::new(None)
            .with("water_pH", 7.9)
            .with("ph", 6.1)
            .with("turbidity_ntu", 5.0)
            .with("water_temp", 28.0);
        let row = LagRow::from_point(&p, 0).unwrap();
        assert_eq!(row.ph, 7.9);
        assert_eq!(row.turbidity, 5.0);
        assert_eq!(row.temperature, 28.0);
    }

    #[test]
    fn test_no_history_repeats_current_reading() {
        let current = SensorReading::new(7.2, 15.0, 26.0);
        let buffer = HistoryWindow::new(6).build(None, &current, now()).unwrap();
        assert_eq!(buffer.rows().len(), 6);
        assert!(buffer.rows().iter().all(|r| *r == LagRow::from(&current)));
        assert_eq!(buffer.anchor(), now());

        let empty: Vec<HistoryPoint> = vec![];
        let buffer = HistoryWindow::new(6).build(Some(&empty), &current, now()).unwrap();
        assert_eq!(buffer.rows().len(), 6);
    }

    #[test]
    fn test_no_history_anchors_on_reading_timestamp() {
        let at = ts("2024-05-04T03:00:00+00:00");
        let current = SensorReading::new(7.2, 15.0, 26.0).at(at);
        let buffer = HistoryWindow::new(3).build(None, &current, now()).unwrap();
        assert_eq!(buffer.anchor(), at);
    }

    #[test]
    fn test_timestamped_history_is_sorted_and_anchors_now() {
        let history = vec![
            point(7.3, Some("2024-05-06T10:00:00+07:00")),
            point(7.1, Some("2024-05-06T09:00:00+07:00")),
            point(7.2, Some("2024-05-06T09:30:00+07:00")),
        ];
        let current = SensorReading::new(0.0, 0.0, 0.0);
        let buffer = HistoryWindow::new(3).build(Some(&history), &current, now()).unwrap();

        let phs: Vec<f64> = buffer.rows().iter().map(|r| r.ph).collect();
        assert_eq!(phs, vec![7.1, 7.2, 7.3]);
        assert_eq!(buffer.anchor(), ts("2024-05-06T10:00:00+07:00"));
    }

    #[test]
    fn test_sorting_compares_instants_across_offsets() {
        let history = vec![
            // 02:00 UTC
            point(7.4, Some("2024-05-06T09:00:00+07:00")),
            // 01:00 UTC
            point(7.0, Some("2024-05-06T01:00:00+00:00")),
        ];
        let buffer = HistoryWindow::new(2)
            .build(Some(&history), &SensorReading::new(0.0, 0.0, 0.0), now())
            .unwrap();
        assert_eq!(buffer.lag(1).unwrap().ph, 7.4);
        assert_eq!(buffer.lag(2).unwrap().ph, 7.0);
    }

    #[test]
    fn test_partially_timestamped_history_keeps_input_order() {
        let history = vec![
            point(7.3, Some("2024-05-06T10:00:00+07:00")),
            point(7.1, None),
            point(7.2, Some("2024-05-06T09:30:00+07:00")),
        ];
        let buffer = HistoryWindow::new(3)
            .build(Some(&history), &SensorReading::new(0.0, 0.0, 0.0), now())
            .unwrap();
        let phs: Vec<f64> = buffer.rows().iter().map(|r| r.ph).collect();
        assert_eq!(phs, vec![7.3, 7.1, 7.2]);
        assert_eq!(buffer.anchor(), now());
    }

    #[test]
    fn test_short_history_is_tail_padded() {
        let history = vec![point(7.0, None), point(7.5, None)];
        let buffer = HistoryWindow::new(6)
            .build(Some(&history), &SensorReading::new(0.0, 0.0, 0.0), now())
            .unwrap();
        let phs: Vec<f64> = buffer.rows().iter().map(|r| r.ph).collect();
        assert_eq!(phs, vec![7.0, 7.5, 7.5, 7.5, 7.5, 7.5]);
    }

    #[test]
    fn test_long_history_keeps_most_recent_rows() {
        let history: Vec<_> = (0..10).map(|i| point(i as f64, None)).collect();
        let buffer = HistoryWindow::new(4)
            .build(Some(&history), &SensorReading::new(0.0, 0.0, 0.0), now())
            .unwrap();
        let phs: Vec<f64> = buffer.rows().iter().map(|r| r.ph).collect();
        assert_eq!(phs, vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_unresolvable_column_reports_row() {
        let history = vec![
            point(7.0, None),
            HistoryPoint::new(None).with("ph", 7.0).with("temperature", 27.0),
        ];
        let err = HistoryWindow::new(6)
            .build(Some(&history), &SensorReading::new(0.0, 0.0, 0.0), now())
            .unwrap_err();
        match err {
            PipelineError::UnresolvableColumn { row, column, .. } => {
                assert_eq!(row, 1);
                assert_eq!(column, "turbidity_ntu");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_history_value_reports_row() {
        let history = vec![
            HistoryPoint::new(None)
                .with("ph", 7.0)
                .with("turbidity", -3.0)
                .with("temperature", 27.0),
            point(7.2, None),
        ];
        let err = HistoryWindow::new(6)
            .build(Some(&history), &SensorReading::new(7.2, 10.0, 27.0), now())
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
        assert!(err.to_string().contains("history row 0"));
        assert!(err.to_string().contains("turbidity must be >= 0"));
    }

    #[test]
    fn test_lag_indexing() {
        let history: Vec<_> = (1..=3).map(|i| point(i as f64, None)).collect();
        let buffer = HistoryWindow::new(3)
            .build(Some(&history), &SensorReading::new(0.0, 0.0, 0.0), now())
            .unwrap();
        assert_eq!(buffer.lag(1).unwrap().ph, 3.0);
        assert_eq!(buffer.lag(3).unwrap().ph, 1.0);
        assert!(buffer.lag(0).is_none());
        assert!(buffer.lag(4).is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_buffer_always_has_n_lags_rows(
            n_lags in 1usize..12,
            values in proptest::collection::vec(0.0f64..14.0, 0..20),
        ) {
            let history: Vec<_> = values.iter().map(|v| point(*v, None)).collect();
            let buffer = HistoryWindow::new(n_lags)
                .build(Some(&history), &SensorReading::new(7.0, 1.0, 25.0), now())
                .unwrap();
            prop_assert_eq!(buffer.rows().len(), n_lags);

            // Supplied rows keep their order at the front of the buffer
            if !values.is_empty() && values.len() <= n_lags {
                let phs: Vec<f64> = buffer.rows().iter().map(|r| r.ph).collect();
                prop_assert_eq!(&phs[..values.len()], &values[..]);
            }
        }
    }
}
