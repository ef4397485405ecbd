//! Configuration for the gazetteer store and its spatial index.

#[cfg(feature = "toml")]
use crate::error::GazetteerError;
use serde::de::Error;

/// Store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Spatial index shape
    #[serde(default)]
    pub index: IndexConfig,
}

/// R-tree node capacity settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Fan-out: children per node before a split
    #[serde(default = "IndexConfig::default_max_entries")]
    pub max_entries: usize,

    /// Fill below which a node is dissolved on delete
    #[serde(default = "IndexConfig::default_min_entries")]
    pub min_entries: usize,
}

impl IndexConfig {
    const fn default_max_entries() -> usize {
        16
    }

    const fn default_min_entries() -> usize {
        6
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries < 4 {
            return Err(format!(
                "max_entries must be at least 4, got {}",
                self.max_entries
            ));
        }

        if self.min_entries < 2 || self.min_entries > self.max_entries / 2 {
            return Err(format!(
                "min_entries must be in [2, {}], got {}",
                self.max_entries / 2,
                self.min_entries
            ));
        }

        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_entries: Self::default_max_entries(),
            min_entries: Self::default_min_entries(),
        }
    }
}

impl Config {
    /// Set the index fan-out; `min_entries` is kept at or below half of it.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        assert!(max_entries >= 4, "Fan-out must be at least 4");

        if max_entries > 256 {
            log::warn!(
                "Fan-out of {} is very large; leaf scans will dominate query time",
                max_entries
            );
        }

        self.index.max_entries = max_entries;
        self.index.min_entries = self.index.min_entries.min(max_entries / 2);
        self
    }

    pub fn with_min_entries(mut self, min_entries: usize) -> Self {
        assert!(min_entries >= 2, "Minimum fill must be at least 2");
        self.index.min_entries = min_entries;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        self.index.validate()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a TOML document. Syntax errors come back as
    /// [`GazetteerError::Toml`], out-of-range values as
    /// [`GazetteerError::InvalidConfig`].
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate().map_err(GazetteerError::InvalidConfig)?;
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
