//! Export of flag updates for the write-back side.
//!
//! Updates are written as two small tables, `observation_id,qc_flag` and
//! `feature_id,qc_flag`, in CSV or Snappy-compressed Parquet.

use crate::constants::export;
use crate::error::Result;
use crate::models::{FeatureFlagUpdate, FlagUpdate};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const OBSERVATION_FLAGS_STEM: &str = "observation_flags";
pub const FEATURE_FLAGS_STEM: &str = "feature_flags";

/// File format of exported flag tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Csv,
    Parquet,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Parquet => "parquet",
        }
    }

    /// `<dir>/<stem>.<extension>`
    pub fn path_in(self, dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{}.{}", stem, self.extension()))
    }
}

pub fn observation_flags_frame(updates: &[FlagUpdate]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new(
            export::OBSERVATION_ID.into(),
            updates.iter().map(|u| u.observation_id).collect::<Vec<u64>>(),
        ),
        Column::new(
            export::QC_FLAG.into(),
            updates.iter().map(|u| u.qc_flag.code()).collect::<Vec<&str>>(),
        ),
    ])?)
}

pub fn feature_flags_frame(updates: &[FeatureFlagUpdate]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new(
            export::FEATURE_ID.into(),
            updates.iter().map(|u| u.feature_id).collect::<Vec<u64>>(),
        ),
        Column::new(
            export::QC_FLAG.into(),
            updates.iter().map(|u| u.qc_flag.code()).collect::<Vec<&str>>(),
        ),
    ])?)
}

pub fn write_frame(df: &mut DataFrame, path: &Path, format: ExportFormat) -> Result<()> {
    let file = File::create(path)?;
    match format {
        ExportFormat::Csv => CsvWriter::new(file).include_header(true).finish(df)?,
        ExportFormat::Parquet => {
            ParquetWriter::new(file)
                .with_compression(ParquetCompression::Snappy)
                .finish(df)?;
        }
    }
    debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Write both update tables into `dir`, returning the written paths
pub fn write_updates(
    dir: &Path,
    observations: &[FlagUpdate],
    features: &[FeatureFlagUpdate],
    format: ExportFormat,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let observation_path = format.path_in(dir, OBSERVATION_FLAGS_STEM);
    write_frame(
        &mut observation_flags_frame(observations)?,
        &observation_path,
        format,
    )?;

    let feature_path = format.path_in(dir, FEATURE_FLAGS_STEM);
    write_frame(&mut feature_flags_frame(features)?, &feature_path, format)?;

    Ok(vec![observation_path, feature_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::QualityFlags;
    use tempfile::TempDir;

    #[test]
    fn test_observation_frame_uses_codes() {
        let updates = vec![
            FlagUpdate {
                observation_id: 3,
                qc_flag: QualityFlags::Bad,
            },
            FlagUpdate {
                observation_id: 4,
                qc_flag: QualityFlags::BelowLimitOfQuantification,
            },
        ];
        let df = observation_flags_frame(&updates).unwrap();

        let codes: Vec<Option<&str>> = df
            .column("qc_flag")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(codes, vec![Some("4"), Some("Q")]);
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, ["observation_id", "qc_flag"]);
    }

    #[test]
    fn test_write_updates_in_both_formats() {
        let dir = TempDir::new().unwrap();
        let features = vec![FeatureFlagUpdate {
            feature_id: 12,
            qc_flag: QualityFlags::ProbablyGood,
        }];

        for format in [ExportFormat::Csv, ExportFormat::Parquet] {
            let paths = write_updates(dir.path(), &[], &features, format).unwrap();
            assert_eq!(paths.len(), 2);
            assert!(paths.iter().all(|path| path.exists()));
            assert!(paths[1].to_string_lossy().ends_with(format.extension()));
        }

        let text = std::fs::read_to_string(dir.path().join("feature_flags.csv")).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), ["feature_id,qc_flag", "12,2"]);
    }
}
