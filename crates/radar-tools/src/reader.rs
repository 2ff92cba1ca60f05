//! Composite readers.
//!
//! Every on-disk format is normalised into [`RawComposite`]; the accessors
//! never look at file formats directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use radar_common::{Cell, Field, LatLonGrid, PathTemplate, Quantity, RadarError, RadarResult, Sentinels};

/// A composite as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RawComposite {
    /// Quantity stored in `data`.
    pub quantity: Quantity,
    pub data: Field,
    /// Quality index in [0, 1], if the file carries one.
    pub quality: Option<Field>,
    /// Cell coordinates, if the file carries them.
    pub grid: Option<LatLonGrid>,
}

impl RawComposite {
    /// Quality index, defaulting to full confidence everywhere.
    pub fn quality_or_default(&self) -> Field {
        self.quality
            .clone()
            .unwrap_or_else(|| Field::filled(self.data.nrows(), self.data.ncols(), Cell::Value(1.0)))
    }
}

/// Reads composites of one file format.
pub trait CompositeReader: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Read the composite at `path`, or `Ok(None)` when no file exists there.
    fn read(&self, path: &Path) -> RadarResult<Option<RawComposite>>;
}

/// Readers keyed by lowercase file extension.
#[derive(Clone, Default)]
pub struct ReaderRegistry {
    readers: HashMap<String, Arc<dyn CompositeReader>>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in JSON reader.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("json", Arc::new(JsonCompositeReader));
        registry
    }

    pub fn register(&mut self, extension: &str, reader: Arc<dyn CompositeReader>) {
        self.readers.insert(extension.to_lowercase(), reader);
    }

    /// Reader for files produced by `template`.
    pub fn for_template(&self, template: &PathTemplate) -> RadarResult<Arc<dyn CompositeReader>> {
        let extension = template.extension().ok_or_else(|| {
            RadarError::UnsupportedFormat(format!(
                "'{}' has no file extension",
                template.recipe()
            ))
        })?;
        self.readers
            .get(&extension)
            .cloned()
            .ok_or_else(|| RadarError::UnsupportedFormat(format!("no reader for '.{}' files", extension)))
    }
}

impl std::fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extensions: Vec<&String> = self.readers.keys().collect();
        extensions.sort();
        f.debug_struct("ReaderRegistry")
            .field("extensions", &extensions)
            .finish()
    }
}

/// Sentinels written by [`CompositeFile::new`]; unlike the defaults they
/// keep `Unmapped` apart from `Missing`.
pub const FILE_SENTINELS: Sentinels = Sentinels {
    missing: -9999.0,
    undetect: -3333.0,
    unmapped: -8888.0,
};

/// On-disk JSON layout of a composite.
///
/// Sentinel cells are stored as the numeric values in `sentinels`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeFile {
    pub quantity: Quantity,
    #[serde(default)]
    pub valid_time: Option<DateTime<Utc>>,
    pub nrows: usize,
    pub ncols: usize,
    pub data: Vec<f32>,
    #[serde(default)]
    pub quality: Option<Vec<f32>>,
    #[serde(default)]
    pub lat: Option<Vec<f64>>,
    #[serde(default)]
    pub lon: Option<Vec<f64>>,
    #[serde(default)]
    pub sentinels: Sentinels,
}

impl CompositeFile {
    pub fn new(
        quantity: Quantity,
        valid_time: Option<DateTime<Utc>>,
        data: &Field,
        quality: Option<&Field>,
        grid: Option<&LatLonGrid>,
    ) -> Self {
        let sentinels = FILE_SENTINELS;
        Self {
            quantity,
            valid_time,
            nrows: data.nrows(),
            ncols: data.ncols(),
            data: data.to_raw(&sentinels),
            quality: quality.map(|q| q.to_raw(&sentinels)),
            lat: grid.map(|g| g.lat().to_vec()),
            lon: grid.map(|g| g.lon().to_vec()),
            sentinels,
        }
    }

    /// Decode into the in-memory contract. `path` is only used in errors.
    pub fn decode(self, path: &Path) -> RadarResult<RawComposite> {
        let shape = (self.nrows, self.ncols);
        let invalid = |e: RadarError| RadarError::read(path, e.to_string());

        let data = Field::from_raw(self.nrows, self.ncols, &self.data, &self.sentinels).map_err(invalid)?;
        let quality = self
            .quality
            .map(|q| Field::from_raw(self.nrows, self.ncols, &q, &self.sentinels))
            .transpose()
            .map_err(invalid)?;
        let grid = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(LatLonGrid::new(shape.0, shape.1, lat, lon).map_err(invalid)?),
            (None, None) => None,
            _ => return Err(RadarError::read(path, "latitudes and longitudes must come together")),
        };
        Ok(RawComposite {
            quantity: self.quantity,
            data,
            quality,
            grid,
        })
    }

    /// Write as JSON, creating parent directories as needed.
    pub fn write(&self, path: &Path) -> RadarResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        debug!(path = %path.display(), quantity = %self.quantity, "Wrote composite");
        Ok(())
    }
}

/// Reader for [`CompositeFile`] JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCompositeReader;

impl JsonCompositeReader {
    /// Read the raw document, including its valid time.
    pub fn read_file(path: &Path) -> RadarResult<Option<CompositeFile>> {
        if !path.is_file() {
            return Ok(None);
        }
        let file = File::open(path).map_err(|e| RadarError::read(path, e.to_string()))?;
        let doc = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| RadarError::read(path, e.to_string()))?;
        Ok(Some(doc))
    }
}

impl CompositeReader for JsonCompositeReader {
    fn name(&self) -> &str {
        "json"
    }

    fn read(&self, path: &Path) -> RadarResult<Option<RawComposite>> {
        Self::read_file(path)?.map(|doc| doc.decode(path)).transpose()
    }
}
