use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{MeasurementFile, StorageBackend, StorageError};
use crate::config::StoreMode;
use crate::record::{CycleRecord, Stats};

/// On-disk shape of the measurement document: `{"data": [...]}`
#[derive(Serialize, Deserialize)]
struct Document {
    data: Vec<RecordEntry>,
}

/// One record, flattened. Statistics of a sensor without valid samples are
/// written as `null`.
#[derive(Serialize, Deserialize)]
struct RecordEntry {
    cycle_index: u32,
    timestamp: DateTime<Utc>,
    distance_min: Option<f64>,
    distance_max: Option<f64>,
    distance_mean: Option<f64>,
    distance_median: Option<f64>,
    distance_sample_count: u32,
    #[serde(default)]
    distance_discarded: u32,
    temperature_min: Option<f64>,
    temperature_max: Option<f64>,
    temperature_mean: Option<f64>,
    temperature_median: Option<f64>,
    temperature_sample_count: u32,
    #[serde(default)]
    temperature_discarded: u32,
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn stats_from_parts(
    sensor: &str,
    values: [Option<f64>; 4],
    sample_count: u32,
    discarded: u32,
) -> Result<Stats, String> {
    if sample_count == 0 {
        return Ok(Stats::empty(discarded));
    }
    match values {
        [Some(min), Some(max), Some(mean), Some(median)] => Ok(Stats {
            min,
            max,
            mean,
            median,
            sample_count,
            discarded,
        }),
        _ => Err(format!("{sensor} statistics missing for {sample_count} samples")),
    }
}

impl From<&CycleRecord> for RecordEntry {
    fn from(record: &CycleRecord) -> Self {
        let d = &record.distance;
        let t = &record.temperature;
        Self {
            cycle_index: record.cycle_index,
            timestamp: record.timestamp,
            distance_min: finite(d.min),
            distance_max: finite(d.max),
            distance_mean: finite(d.mean),
            distance_median: finite(d.median),
            distance_sample_count: d.sample_count,
            distance_discarded: d.discarded,
            temperature_min: finite(t.min),
            temperature_max: finite(t.max),
            temperature_mean: finite(t.mean),
            temperature_median: finite(t.median),
            temperature_sample_count: t.sample_count,
            temperature_discarded: t.discarded,
        }
    }
}

impl TryFrom<RecordEntry> for CycleRecord {
    type Error = String;

    fn try_from(entry: RecordEntry) -> Result<Self, Self::Error> {
        let distance = stats_from_parts(
            "distance",
            [
                entry.distance_min,
                entry.distance_max,
                entry.distance_mean,
                entry.distance_median,
            ],
            entry.distance_sample_count,
            entry.distance_discarded,
        )?;
        let temperature = stats_from_parts(
            "temperature",
            [
                entry.temperature_min,
                entry.temperature_max,
                entry.temperature_mean,
                entry.temperature_median,
            ],
            entry.temperature_sample_count,
            entry.temperature_discarded,
        )?;

        Ok(Self {
            cycle_index: entry.cycle_index,
            timestamp: entry.timestamp,
            distance,
            temperature,
        })
    }
}

fn encode<'a>(records: impl Iterator<Item = &'a CycleRecord>) -> Result<Vec<u8>, StorageError> {
    let document = Document {
        data: records.map(RecordEntry::from).collect(),
    };
    serde_json::to_vec(&document).map_err(StorageError::Encode)
}

fn decode(name: &str, contents: &[u8]) -> Result<Vec<CycleRecord>, StorageError> {
    let corrupt = |source: serde_json::Error| StorageError::Corrupt {
        name: name.to_owned(),
        source,
    };

    // A zero-length file is what an interrupted first write leaves behind
    if contents.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let document: Document = serde_json::from_slice(contents).map_err(corrupt)?;
    document
        .data
        .into_iter()
        .map(|entry| {
            CycleRecord::try_from(entry)
                .map_err(|msg| corrupt(<serde_json::Error as serde::de::Error>::custom(msg)))
        })
        .collect()
}

/// Ordered sequence of cycle records, mirrored to a storage backend
///
/// The backend always holds the full document; each append rewrites it.
pub struct MeasurementStore<B> {
    backend: B,
    records: Vec<CycleRecord>,
    pending: bool,
}

impl<B: StorageBackend> MeasurementStore<B> {
    /// Open the store. In [`StoreMode::Append`] the existing document is
    /// loaded; in [`StoreMode::Fresh`] it is ignored and replaced by the
    /// first append.
    pub fn open(backend: B, mode: StoreMode) -> Result<Self, StorageError> {
        let mut store = Self {
            backend,
            records: Vec::new(),
            pending: false,
        };
        if mode == StoreMode::Append {
            let restored = store.load_existing()?;
            store.pending = restored > 0;
            info!("(storage) Restored {} records from {}", restored, store.backend.name());
        }
        Ok(store)
    }

    /// Replace the in-memory records with the stored document. A missing
    /// document yields no records. Returns the number of records loaded.
    pub fn load_existing(&mut self) -> Result<usize, StorageError> {
        let name = self.backend.name().to_owned();
        let contents = self
            .backend
            .read()
            .map_err(|source| StorageError::Read {
                name: name.clone(),
                source,
            })?;

        self.records = match contents {
            Some(contents) => decode(&name, &contents)?,
            None => Vec::new(),
        };
        Ok(self.records.len())
    }

    /// Persist `record` after the existing ones. On failure neither the
    /// stored document nor the in-memory sequence change.
    ///
    /// Returns the number of stored records.
    pub fn append(&mut self, record: CycleRecord) -> Result<usize, StorageError> {
        let contents = encode(self.records.iter().chain(core::iter::once(&record)))?;
        self.backend
            .write(&contents)
            .map_err(|source| StorageError::Write {
                name: self.backend.name().to_owned(),
                source,
            })?;

        self.records.push(record);
        self.pending = true;
        debug!(
            "(storage) {} records, {} bytes in {}",
            self.records.len(),
            contents.len(),
            self.backend.name()
        );
        Ok(self.records.len())
    }

    pub fn records(&self) -> &[CycleRecord] {
        &self.records
    }

    /// Whether records were stored since the last successful upload
    pub fn has_pending(&self) -> bool {
        self.pending
    }

    pub fn mark_uploaded(&mut self) {
        self.pending = false;
    }

    /// Current raw document as stored. Empty when nothing was written yet.
    pub fn snapshot(&mut self) -> Result<MeasurementFile, StorageError> {
        let name = self.backend.name().to_owned();
        let contents = self
            .backend
            .read()
            .map_err(|source| StorageError::Read {
                name: name.clone(),
                source,
            })?
            .unwrap_or_default();
        Ok(MeasurementFile::new(name, contents))
    }

    /// The document rebuilt from the in-memory records. Matches what the
    /// last successful write stored.
    pub fn encoded(&self) -> Result<MeasurementFile, StorageError> {
        let contents = encode(self.records.iter())?;
        Ok(MeasurementFile::new(self.backend.name(), contents))
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}
