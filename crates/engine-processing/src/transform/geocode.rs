use super::FieldTransformer;
use crate::error::TransformError;
use model::{core::value::Value, mapping::field::FieldTransform};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, io, path::Path, sync::Arc};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn to_value(self) -> Value {
        Value::Json(serde_json::json!({ "lat": self.lat, "lon": self.lon }))
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeRecord {
    zip: String,
    lat: f64,
    lon: f64,
}

/// Zip code centroids. Three-digit prefixes resolve to the mean of every
/// five-digit zip sharing the prefix.
#[derive(Debug, Default)]
pub struct ZipGeocodeTable {
    zip5: HashMap<String, GeoPoint>,
    zip3: HashMap<String, GeoPoint>,
}

impl ZipGeocodeTable {
    /// Reads a CSV file with a `zip,lat,lon` header.
    pub fn load(path: &Path) -> Result<Self, TransformError> {
        let file = std::fs::File::open(path).map_err(|e| TransformError::Table {
            path: path.to_path_buf(),
            source: csv::Error::from(e),
        })?;
        let table = Self::from_reader(file).map_err(|source| TransformError::Table {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), zips = table.len(), "Loaded geocode table");
        Ok(table)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut zip5 = HashMap::new();
        for record in reader.deserialize::<GeocodeRecord>() {
            let record = record?;
            if let Some(zip) = normalize_zip(&record.zip, 5) {
                zip5.insert(
                    zip,
                    GeoPoint {
                        lat: record.lat,
                        lon: record.lon,
                    },
                );
            }
        }

        Ok(Self::from_points(zip5))
    }

    pub fn from_points(zip5: HashMap<String, GeoPoint>) -> Self {
        let mut sums: HashMap<String, (f64, f64, usize)> = HashMap::new();
        for (zip, point) in &zip5 {
            let Some(prefix) = zip.get(..3) else {
                continue;
            };
            let entry = sums.entry(prefix.to_string()).or_default();
            entry.0 += point.lat;
            entry.1 += point.lon;
            entry.2 += 1;
        }
        let zip3 = sums
            .into_iter()
            .map(|(prefix, (lat, lon, n))| {
                let n = n as f64;
                (
                    prefix,
                    GeoPoint {
                        lat: lat / n,
                        lon: lon / n,
                    },
                )
            })
            .collect();

        ZipGeocodeTable { zip5, zip3 }
    }

    pub fn len(&self) -> usize {
        self.zip5.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip5.is_empty()
    }

    pub fn lookup_zip5(&self, zip: &str) -> Option<GeoPoint> {
        normalize_zip(zip, 5).and_then(|z| self.zip5.get(&z).copied())
    }

    pub fn lookup_zip3(&self, zip: &str) -> Option<GeoPoint> {
        normalize_zip(zip, 3).and_then(|z| self.zip3.get(&z).copied())
    }
}

/// Leading digits of a zip code, left-padded to `width` when shorter
/// (numeric sources drop leading zeros) and cut to `width` when longer.
fn normalize_zip(input: &str, width: usize) -> Option<String> {
    let digits: String = input
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    let padded = format!("{digits:0>width$}");
    Some(padded[..width].to_string())
}

#[derive(Debug, Clone)]
pub struct Zip3Geocoder {
    table: Arc<ZipGeocodeTable>,
}

impl Zip3Geocoder {
    pub fn new(table: Arc<ZipGeocodeTable>) -> Self {
        Zip3Geocoder { table }
    }
}

impl FieldTransformer for Zip3Geocoder {
    fn kind(&self) -> FieldTransform {
        FieldTransform::Zip3ToGeocode
    }

    fn transform(&self, input: &str) -> Result<Option<Value>, TransformError> {
        Ok(self.table.lookup_zip3(input).map(GeoPoint::to_value))
    }
}

#[derive(Debug, Clone)]
pub struct Zip5Geocoder {
    table: Arc<ZipGeocodeTable>,
}

impl Zip5Geocoder {
    pub fn new(table: Arc<ZipGeocodeTable>) -> Self {
        Zip5Geocoder { table }
    }
}

impl FieldTransformer for Zip5Geocoder {
    fn kind(&self) -> FieldTransform {
        FieldTransform::Zip5ToGeocode
    }

    fn transform(&self, input: &str) -> Result<Option<Value>, TransformError> {
        Ok(self.table.lookup_zip5(input).map(GeoPoint::to_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV: &str = "zip,lat,lon\n02139,42.36,-71.10\n02141, 42.37 ,-71.08\n90210,34.09,-118.41\n";

    fn table() -> Arc<ZipGeocodeTable> {
        Arc::new(ZipGeocodeTable::from_reader(CSV.as_bytes()).unwrap())
    }

    #[test]
    fn zip5_lookup_tolerates_formatting() {
        let geocoder = Zip5Geocoder::new(table());

        let expected = Some(GeoPoint {
            lat: 42.36,
            lon: -71.10,
        }
        .to_value());
        assert_eq!(geocoder.transform("02139").unwrap(), expected);
        assert_eq!(geocoder.transform("2139").unwrap(), expected);
        assert_eq!(geocoder.transform(" 02139-4307").unwrap(), expected);
        assert_eq!(geocoder.transform("99999").unwrap(), None);
        assert_eq!(geocoder.transform("n/a").unwrap(), None);
    }

    #[test]
    fn zip3_resolves_to_prefix_centroid() {
        let point = table().lookup_zip3("021").unwrap();
        assert!((point.lat - 42.365).abs() < 1e-9);
        assert!((point.lon + 71.09).abs() < 1e-9);

        assert_eq!(table().lookup_zip3("902").map(|p| p.lat), Some(34.09));
    }

    #[test]
    fn transforms_are_idempotent() {
        let geocoder = Zip3Geocoder::new(table());
        let first = geocoder.transform("02139").unwrap();
        let second = geocoder.transform("02139").unwrap();
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn loads_table_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();

        let table = ZipGeocodeTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 3);

        let missing = ZipGeocodeTable::load(Path::new("/nonexistent/zips.csv"));
        assert!(matches!(missing, Err(TransformError::Table { .. })));
    }
}
