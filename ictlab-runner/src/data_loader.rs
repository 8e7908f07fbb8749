//! CSV bar loading.
//!
//! Expected columns: `timestamp,open,high,low,close,volume`, with RFC 3339
//! timestamps carrying the exchange's UTC offset
//! (`2024-01-02T09:30:00-05:00`). The series is validated before it is
//! returned: strictly increasing timestamps and sane OHLC on every bar.

use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use ictlab_core::domain::{validate_series, Bar, BarError};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed bar data: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid bar series: {0}")]
    Invalid(#[from] BarError),

    #[error("no bars in input")]
    Empty,
}

/// Load and validate a bar series from a CSV file.
pub fn load_bars_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let bars = read_bars(file)?;
    info!(
        path = %path.display(),
        bars = bars.len(),
        first = %bars[0].timestamp,
        last = %bars[bars.len() - 1].timestamp,
        "loaded bars"
    );
    Ok(bars)
}

/// Parse and validate a bar series from any CSV source.
pub fn read_bars<R: Read>(source: R) -> Result<Vec<Bar>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);
    let bars = reader.deserialize().collect::<Result<Vec<Bar>, _>>()?;
    if bars.is_empty() {
        return Err(LoadError::Empty);
    }
    validate_series(&bars)?;
    Ok(bars)
}

/// BLAKE3 digest of a bar series, for tagging results with the data they came from.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.timestamp.to_rfc3339().as_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&v.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
