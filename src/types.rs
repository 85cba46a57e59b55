use geo::MultiPolygon;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct BoundaryArea {
    pub ward_name: String,
    pub borough: String,
    pub geometry: MultiPolygon<f64>,
}

/// Level to join the data table on. Serialized forms are exactly
/// "borough" and "ward_name"; anything else is rejected when the
/// config is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinLevel {
    Borough,
    WardName,
}

impl BoundaryArea {
    pub fn join_key(&self, level: JoinLevel) -> &str {
        match level {
            JoinLevel::Borough => &self.borough,
            JoinLevel::WardName => &self.ward_name,
        }
    }
}

/// Tabular input keyed by region identifier (borough or ward name).
/// Each row is a set of named numeric attributes.
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    pub rows: HashMap<String, HashMap<String, f64>>,
}

impl DataTable {
    /// Min and max of a column across the whole table, ignoring rows
    /// where the column is absent. None if no row has the column.
    pub fn column_bounds(&self, column: &str) -> Option<(f64, f64)> {
        let mut bounds: Option<(f64, f64)> = None;
        for row in self.rows.values() {
            if let Some(&v) = row.get(column) {
                bounds = Some(match bounds {
                    Some((min, max)) => (min.min(v), max.max(v)),
                    None => (v, v),
                });
            }
        }
        bounds
    }

    pub fn get(&self, key: &str, column: &str) -> Option<f64> {
        self.rows.get(key).and_then(|row| row.get(column)).copied()
    }
}
