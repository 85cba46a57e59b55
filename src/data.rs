use crate::types::{BoundaryArea, DataTable};
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use geo::MultiPolygon;
use shapefile::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

// Attribute names carried by the London_Ward shapefile (and mirrored in
// GeoJSON exports of it).
const WARD_NAME_FIELD: &str = "NAME";
const BOROUGH_FIELD: &str = "DISTRICT";

/// The boundary data labels Westminster "City of Westminster"; input
/// tables use the short name. Applied to every record on load, before
/// any join can happen.
fn standardise_borough(name: String) -> String {
    if name == "City of Westminster" {
        "Westminster".to_string()
    } else {
        name
    }
}

pub fn load_boundaries(path: &Path) -> Result<Vec<BoundaryArea>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Boundary file has no extension"))?;

    let areas = match extension.as_str() {
        "shp" => load_shapefile(path)?,
        "json" | "geojson" => load_geojson(path)?,
        _ => return Err(anyhow!("Unsupported boundary format: {}", extension)),
    };

    println!("Loaded {} boundary areas", areas.len());
    Ok(areas)
}

fn load_shapefile(path: &Path) -> Result<Vec<BoundaryArea>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut areas = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let ward_name = match char_field(&record, WARD_NAME_FIELD)? {
            Some(s) => s,
            None => continue, // Skip if null
        };
        let borough = match char_field(&record, BOROUGH_FIELD)? {
            Some(s) => standardise_borough(s),
            None => continue,
        };

        let geometry = match shape {
            shapefile::Shape::Polygon(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?;
                geo_polygon
            }
            shapefile::Shape::PolygonM(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?;
                geo_polygon
            }
            shapefile::Shape::PolygonZ(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?;
                geo_polygon
            }
            _ => continue, // Skip non-polygon shapes
        };

        areas.push(BoundaryArea {
            ward_name,
            borough,
            geometry,
        });
    }

    Ok(areas)
}

fn char_field(record: &shapefile::dbase::Record, name: &str) -> Result<Option<String>> {
    let value = record
        .get(name)
        .ok_or_else(|| anyhow!("Attribute '{}' not found in Shapefile", name))?;
    match value {
        shapefile::dbase::FieldValue::Character(Some(s)) => Ok(Some(s.clone())),
        shapefile::dbase::FieldValue::Character(None) => Ok(None),
        _ => Err(anyhow!("Shapefile attribute '{}' must be a string", name)),
    }
}

fn load_geojson(path: &Path) -> Result<Vec<BoundaryArea>> {
    use geojson::GeoJson;
    use std::io::BufReader;

    let file = File::open(path)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let reader = BufReader::new(file);

    // Parse the GeoJSON. warning: this loads the whole file into memory.
    let geojson = GeoJson::from_reader(reader).context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut areas = Vec::new();

    for feature in collection.features {
        let ward_name = match string_property(&feature, WARD_NAME_FIELD) {
            Some(s) => s,
            None => continue,
        };
        let borough = match string_property(&feature, BOROUGH_FIELD) {
            Some(s) => standardise_borough(s),
            None => continue,
        };

        let geometry = match feature.geometry {
            Some(geom) => {
                let valid_geo: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geojson geometry: {:?}", e))?;

                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            }
            None => continue,
        };

        areas.push(BoundaryArea {
            ward_name,
            borough,
            geometry,
        });
    }

    Ok(areas)
}

fn string_property(feature: &geojson::Feature, name: &str) -> Option<String> {
    match feature.properties.as_ref().and_then(|props| props.get(name)) {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Load the input table from CSV. The key column becomes the region
/// identifier; every other column is kept where its cell parses as a
/// number.
pub fn load_table(path: &Path, key_column: &str) -> Result<DataTable> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let mut rdr = ReaderBuilder::new().from_reader(file);
    let headers = rdr.headers()?.clone();

    let key_idx = headers
        .iter()
        .position(|h| h == key_column)
        .ok_or_else(|| anyhow!("Key column '{}' not found in CSV", key_column))?;

    let mut rows = HashMap::new();

    for result in rdr.records() {
        let record = result?;
        let key = record.get(key_idx).unwrap_or("").to_string();

        if key.is_empty() {
            continue;
        }

        let mut row = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if idx == key_idx {
                continue;
            }
            if let Some(cell) = record.get(idx) {
                if let Ok(value) = cell.trim().parse::<f64>() {
                    row.insert(header.to_string(), value);
                }
            }
        }

        rows.insert(key, row);
    }

    println!("Loaded table with {} rows", rows.len());
    Ok(DataTable { rows })
}
