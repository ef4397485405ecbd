//! Store builder for configuration and initial data.
//!
//! Seed records are collected first and loaded in one bulk load when the
//! store is built, so the index starts out packed.

use crate::config::Config;
use crate::db::DB;
use crate::error::Result;
use crate::types::NewCity;
#[cfg(feature = "csv")]
use std::path::PathBuf;

/// Builder for a store with custom configuration and seed data.
#[derive(Debug)]
pub struct DBBuilder {
    config: Config,
    seed: Vec<NewCity>,
    #[cfg(feature = "csv")]
    csv_paths: Vec<PathBuf>,
}

impl DBBuilder {
    /// Create a new builder with the default configuration and no seed data.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            seed: Vec::new(),
            #[cfg(feature = "csv")]
            csv_paths: Vec::new(),
        }
    }

    /// Set the store configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the index fan-out.
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.config = self.config.with_max_entries(max_entries);
        self
    }

    /// Add records to load at build time, after any CSV files.
    pub fn seed(mut self, cities: impl IntoIterator<Item = NewCity>) -> Self {
        self.seed.extend(cities);
        self
    }

    /// Add a world cities CSV file to load at build time.
    #[cfg(feature = "csv")]
    pub fn csv_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.csv_paths.push(path.into());
        self
    }

    /// Build the store. Fails without creating anything if the configuration
    /// is invalid, a file cannot be read or any seed record is rejected.
    pub fn build(self) -> Result<DB> {
        let db = DB::with_config(self.config)?;

        let mut cities = Vec::new();

        #[cfg(feature = "csv")]
        for path in &self.csv_paths {
            let rows = crate::loader::read_cities_path(path)?;
            log::info!("Read {} cities from {}", rows.len(), path.display());
            cities.extend(rows);
        }

        cities.extend(self.seed);

        if !cities.is_empty() {
            let ids = db.bulk_load(cities)?;
            log::info!("Seeded store with {} cities", ids.len());
        }

        Ok(db)
    }
}

impl Default for DBBuilder {
    fn default() -> Self {
        Self::new()
    }
}
