use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A station from the rail network metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub station_short_code: String,
    pub station_name: String,
    #[serde(default)]
    pub passenger_traffic: bool,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Read-only lookup from station short code to display name.
#[derive(Debug, Clone, Default)]
pub struct StationDirectory {
    names: HashMap<String, String>,
}

impl StationDirectory {
    #[must_use]
    pub fn from_stations(stations: impl IntoIterator<Item = Station>) -> Self {
        let names = stations
            .into_iter()
            .map(|s| (s.station_short_code, s.station_name))
            .collect();
        Self { names }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Full name for a code, without the "asema" suffix.
    ///
    /// Unknown codes fall back to the code itself; a missing code renders
    /// as `?`.
    #[must_use]
    pub fn display_name(&self, code: Option<&str>) -> String {
        let Some(code) = code else {
            return "?".to_string();
        };
        let name = self.names.get(code).map_or(code, String::as_str);
        strip_station_suffix(name).to_string()
    }
}

/// Drop a trailing "asema" (Finnish for "station"), with or without a
/// single preceding space, matched case-insensitively.
#[must_use]
pub fn strip_station_suffix(name: &str) -> &str {
    const SUFFIX: &str = "asema";
    let len = name.len();
    if len < SUFFIX.len() || !name.is_char_boundary(len - SUFFIX.len()) {
        return name;
    }
    let (head, tail) = name.split_at(len - SUFFIX.len());
    if !tail.eq_ignore_ascii_case(SUFFIX) {
        return name;
    }
    head.strip_suffix(' ').unwrap_or(head)
}
