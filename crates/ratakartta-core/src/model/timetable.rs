use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::ids::TrainNumber;

/// Kind of a timetable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowType {
    Departure,
    Arrival,
    #[serde(other)]
    Other,
}

/// A single scheduled stop event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableRow {
    pub station_short_code: String,
    #[serde(rename = "type")]
    pub row_type: RowType,
}

impl TimetableRow {
    #[must_use]
    pub fn new(station_short_code: impl Into<String>, row_type: RowType) -> Self {
        Self {
            station_short_code: station_short_code.into(),
            row_type,
        }
    }
}

/// The full stop sequence of one train on one service day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timetable {
    pub train_number: TrainNumber,
    #[serde(default)]
    pub departure_date: Option<NaiveDate>,
    #[serde(default)]
    pub time_table_rows: Vec<TimetableRow>,
}

impl Timetable {
    /// Station code of the first scheduled departure.
    #[must_use]
    pub fn first_departure(&self) -> Option<&str> {
        self.time_table_rows
            .iter()
            .find(|r| r.row_type == RowType::Departure)
            .map(|r| r.station_short_code.as_str())
    }

    /// Station code of the last scheduled arrival.
    #[must_use]
    pub fn last_arrival(&self) -> Option<&str> {
        self.time_table_rows
            .iter()
            .rev()
            .find(|r| r.row_type == RowType::Arrival)
            .map(|r| r.station_short_code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_timetable_response() {
        let json = r#"[{
            "trainNumber": 905,
            "departureDate": "2024-03-01",
            "operatorShortCode": "vr",
            "timeTableRows": [
                {"stationShortCode": "HKI", "type": "DEPARTURE", "commercialStop": true},
                {"stationShortCode": "PSL", "type": "ARRIVAL"},
                {"stationShortCode": "PSL", "type": "PASS"}
            ]
        }]"#;
        let tables: Vec<Timetable> = serde_json::from_str(json).unwrap();
        assert_eq!(tables.len(), 1);
        let rows = &tables[0].time_table_rows;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].row_type, RowType::Departure);
        assert_eq!(rows[1].row_type, RowType::Arrival);
        assert_eq!(rows[2].row_type, RowType::Other);
    }

    #[test]
    fn test_first_departure_and_last_arrival() {
        let table = Timetable {
            train_number: TrainNumber::new(1),
            departure_date: None,
            time_table_rows: vec![
                TimetableRow::new("A", RowType::Departure),
                TimetableRow::new("B", RowType::Arrival),
                TimetableRow::new("B", RowType::Departure),
                TimetableRow::new("C", RowType::Arrival),
            ],
        };
        assert_eq!(table.first_departure(), Some("A"));
        assert_eq!(table.last_arrival(), Some("C"));
    }

    #[test]
    fn test_no_rows() {
        let table = Timetable {
            train_number: TrainNumber::new(1),
            departure_date: None,
            time_table_rows: vec![],
        };
        assert_eq!(table.first_departure(), None);
        assert_eq!(table.last_arrival(), None);
    }
}
