//! CSV ingestion of the world cities data set.
//!
//! Expected headers are `Country, City, Accent City, Region, Population,
//! Latitude, Longitude`. Lower-case and snake-case header spellings are
//! accepted too, `Population` is optional and any other extra column is
//! ignored. Rows are converted to [`NewCity`] values ready for
//! [`crate::DB::bulk_load`].

use crate::error::Result;
use crate::types::{Coordinate, NewCity};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CityRow {
    #[serde(alias = "Country")]
    country: String,
    #[serde(alias = "City")]
    city: String,
    #[serde(alias = "Accent City", alias = "AccentCity")]
    accent_city: String,
    #[serde(alias = "Region")]
    region: String,
    #[serde(alias = "Latitude")]
    latitude: f64,
    #[serde(alias = "Longitude")]
    longitude: f64,
}

impl CityRow {
    fn into_city(self) -> Result<NewCity> {
        let location = Coordinate::new(self.longitude, self.latitude)?;
        Ok(NewCity::new(
            self.country,
            self.city,
            self.accent_city,
            self.region,
            location,
        ))
    }
}

/// Parse every row of `reader`.
///
/// A row with an unparsable field fails with the CSV error, which carries
/// its line. A row with an out-of-range coordinate fails with
/// `BulkLoadFailed` carrying the zero-based data row index. Empty text fields
/// are not rejected here; `bulk_load` does that for the whole batch.
pub fn read_cities<R: Read>(reader: R) -> Result<Vec<NewCity>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut cities = Vec::new();
    for (index, row) in rdr.deserialize::<CityRow>().enumerate() {
        let city = row?.into_city().map_err(|e| e.at_bulk_index(index))?;
        cities.push(city);
    }

    log::debug!("Parsed {} city rows", cities.len());
    Ok(cities)
}

/// Parse the CSV file at `path`.
pub fn read_cities_path<P: AsRef<Path>>(path: P) -> Result<Vec<NewCity>> {
    let file = File::open(path.as_ref())?;
    read_cities(BufReader::new(file))
}
