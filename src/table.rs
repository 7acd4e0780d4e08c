//! The observation table: a polars `DataFrame` with a fixed set of typed columns.
//!
//! Tables are normalized on construction so the QC kernels can rely on the
//! column types: ids are `UInt64`, the phenomenon time is a microsecond
//! `Datetime`, values and positions are `Float64`, and the flag column holds
//! L20 codes (null for unset).

use crate::constants::columns;
use crate::error::{QcError, Result};
use crate::export::{ExportFormat, write_frame};
use crate::flags::Flag;
use crate::models::{FlagUpdate, Observation};
use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

const NAIVE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse an ISO-8601 timestamp into UTC microseconds. Naive values are taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<i64> {
    let trimmed = value.trim();
    let rfc_error = match DateTime::parse_from_rfc3339(trimmed) {
        Ok(parsed) => return Ok(parsed.with_timezone(&Utc).timestamp_micros()),
        Err(error) => error,
    };
    NAIVE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc().timestamp_micros())
        .ok_or_else(|| QcError::TimestampParsing {
            value: value.to_string(),
            source: rfc_error,
        })
}

#[derive(Debug, Clone)]
pub struct ObservationTable {
    df: DataFrame,
}

impl ObservationTable {
    /// Validate and normalize a raw frame
    pub fn new(mut df: DataFrame) -> Result<Self> {
        for column in columns::REQUIRED {
            if !has_column(&df, column) {
                return Err(QcError::missing_column(*column));
            }
        }
        let height = df.height();

        for name in [columns::ID, columns::DATASTREAM_ID] {
            let cast = df.column(name)?.cast(&DataType::UInt64)?;
            if cast.null_count() > 0 {
                return Err(QcError::invalid_column(
                    name,
                    "expected non-null unsigned integers",
                ));
            }
            df.with_column(cast)?;
        }

        let micros = time_column_micros(df.column(columns::PHENOMENON_TIME)?)?;
        let times = Column::new(columns::PHENOMENON_TIME.into(), micros)
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
        df.with_column(times)?;

        let result = df.column(columns::RESULT)?.cast(&DataType::Float64)?;
        df.with_column(result)?;
        let observation_type = df
            .column(columns::OBSERVATION_TYPE)?
            .cast(&DataType::String)?;
        df.with_column(observation_type)?;

        for (name, dtype) in [
            (columns::LONGITUDE, DataType::Float64),
            (columns::LATITUDE, DataType::Float64),
            (columns::FEATURE_ID, DataType::UInt64),
            (columns::UNITS, DataType::String),
        ] {
            let column = if has_column(&df, name) {
                df.column(name)?.cast(&dtype)?
            } else {
                Column::full_null(name.into(), height, &dtype)
            };
            df.with_column(column)?;
        }

        for (name, dtype) in [
            (columns::REGION, DataType::String),
            (columns::ELEVATION, DataType::Float64),
        ] {
            if has_column(&df, name) {
                let column = df.column(name)?.cast(&dtype)?;
                df.with_column(column)?;
            }
        }

        // canonical L20 codes, null for unset
        let raw_flags = df.column(columns::QC_FLAG)?.cast(&DataType::String)?;
        let flags = raw_flags
            .str()?
            .into_iter()
            .map(Flag::from_cell)
            .collect::<Result<Vec<_>>>()?;
        df.with_column(flag_column(&flags))?;

        let mut seen = HashSet::with_capacity(height);
        for id in df.column(columns::ID)?.u64()?.into_iter().flatten() {
            if !seen.insert(id) {
                return Err(QcError::invalid_column(
                    columns::ID,
                    format!("duplicate observation id {id}"),
                ));
            }
        }

        Ok(Self { df })
    }

    pub fn from_observations(observations: &[Observation]) -> Result<Self> {
        let micros: Vec<i64> = observations
            .iter()
            .map(|o| o.phenomenon_time.timestamp_micros())
            .collect();
        let flags: Vec<Option<&str>> = observations
            .iter()
            .map(|o| o.qc_flag.map(|flag| flag.code()))
            .collect();

        let mut df = DataFrame::new(vec![
            Column::new(
                columns::ID.into(),
                observations.iter().map(|o| o.id).collect::<Vec<u64>>(),
            ),
            Column::new(
                columns::DATASTREAM_ID.into(),
                observations
                    .iter()
                    .map(|o| o.datastream_id)
                    .collect::<Vec<u64>>(),
            ),
            Column::new(columns::PHENOMENON_TIME.into(), micros),
            Column::new(
                columns::RESULT.into(),
                observations.iter().map(|o| o.result).collect::<Vec<f64>>(),
            ),
            Column::new(
                columns::LONGITUDE.into(),
                observations
                    .iter()
                    .map(|o| o.longitude)
                    .collect::<Vec<Option<f64>>>(),
            ),
            Column::new(
                columns::LATITUDE.into(),
                observations
                    .iter()
                    .map(|o| o.latitude)
                    .collect::<Vec<Option<f64>>>(),
            ),
            Column::new(
                columns::OBSERVATION_TYPE.into(),
                observations
                    .iter()
                    .map(|o| o.observation_type.as_str())
                    .collect::<Vec<&str>>(),
            ),
            Column::new(
                columns::UNITS.into(),
                observations
                    .iter()
                    .map(|o| o.units.as_str())
                    .collect::<Vec<&str>>(),
            ),
            Column::new(
                columns::FEATURE_ID.into(),
                observations
                    .iter()
                    .map(|o| o.feature_id)
                    .collect::<Vec<Option<u64>>>(),
            ),
            Column::new(columns::QC_FLAG.into(), flags),
        ])?;

        if observations.iter().any(|o| o.region.is_some()) {
            df.with_column(Column::new(
                columns::REGION.into(),
                observations
                    .iter()
                    .map(|o| o.region.as_deref())
                    .collect::<Vec<Option<&str>>>(),
            ))?;
        }
        if observations.iter().any(|o| o.elevation.is_some()) {
            df.with_column(Column::new(
                columns::ELEVATION.into(),
                observations
                    .iter()
                    .map(|o| o.elevation)
                    .collect::<Vec<Option<f64>>>(),
            ))?;
        }

        Self::new(df)
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(QcError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10_000))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        debug!("Read {} rows from {}", df.height(), path.display());
        Self::new(df)
    }

    /// Read every CSV file matching a glob pattern into one table
    pub fn read_csv_glob(pattern: &str) -> Result<Self> {
        let paths = glob::glob(pattern)
            .map_err(|e| QcError::configuration(format!("invalid input pattern: {e}")))?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect::<Vec<_>>();

        match paths.as_slice() {
            [] => Err(QcError::InputNotFound {
                path: pattern.into(),
            }),
            [single] => Self::read_csv(single),
            _ => {
                let frames = paths
                    .iter()
                    .map(|path| Self::read_csv(path).map(|table| table.df.lazy()))
                    .collect::<Result<Vec<_>>>()?;
                let df = concat_lf_diagonal(frames, UnionArgs::default())?.collect()?;
                info!("Combined {} input files into {} rows", paths.len(), df.height());
                Self::new(df)
            }
        }
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn data_frame(&self) -> &DataFrame {
        &self.df
    }

    /// Lazy view carrying each row's position and the phenomenon time in
    /// integer microseconds
    pub fn indexed_frame(&self) -> LazyFrame {
        self.df
            .clone()
            .lazy()
            .with_row_index(columns::ROW_INDEX, None)
            .with_column(
                col(columns::PHENOMENON_TIME)
                    .cast(DataType::Int64)
                    .alias(columns::TIME_MICROS),
            )
    }

    pub fn into_data_frame(self) -> DataFrame {
        self.df
    }

    pub fn has_column(&self, name: &str) -> bool {
        has_column(&self.df, name)
    }

    pub fn ids(&self) -> Result<Vec<u64>> {
        non_null_u64(&self.df, columns::ID)
    }

    pub fn datastream_ids(&self) -> Result<Vec<u64>> {
        non_null_u64(&self.df, columns::DATASTREAM_ID)
    }

    /// Phenomenon times as UTC microseconds
    pub fn timestamps(&self) -> Result<Vec<i64>> {
        let column = self
            .df
            .column(columns::PHENOMENON_TIME)?
            .cast(&DataType::Int64)?;
        column
            .i64()?
            .into_iter()
            .map(|v| {
                v.ok_or_else(|| {
                    QcError::invalid_column(columns::PHENOMENON_TIME, "unexpected null")
                })
            })
            .collect()
    }

    /// Measured values; nulls read as NaN
    pub fn results(&self) -> Result<Vec<f64>> {
        f64_or_nan(&self.df, columns::RESULT)
    }

    pub fn longitudes(&self) -> Result<Vec<f64>> {
        f64_or_nan(&self.df, columns::LONGITUDE)
    }

    pub fn latitudes(&self) -> Result<Vec<f64>> {
        f64_or_nan(&self.df, columns::LATITUDE)
    }

    pub fn observation_types(&self) -> Result<Vec<String>> {
        Ok(self
            .df
            .column(columns::OBSERVATION_TYPE)?
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect())
    }

    pub fn feature_ids(&self) -> Result<Vec<Option<u64>>> {
        Ok(self
            .df
            .column(columns::FEATURE_ID)?
            .u64()?
            .into_iter()
            .collect())
    }

    /// Region lookup result, `None` when the table carries no region column
    pub fn regions(&self) -> Result<Option<Vec<Option<String>>>> {
        if !self.has_column(columns::REGION) {
            return Ok(None);
        }
        let values = self
            .df
            .column(columns::REGION)?
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();
        Ok(Some(values))
    }

    /// Bathymetry lookup result, `None` when the table carries no elevation column
    pub fn elevations(&self) -> Result<Option<Vec<Option<f64>>>> {
        if !self.has_column(columns::ELEVATION) {
            return Ok(None);
        }
        let values = self
            .df
            .column(columns::ELEVATION)?
            .f64()?
            .into_iter()
            .collect();
        Ok(Some(values))
    }

    pub fn flags(&self) -> Result<Vec<Flag>> {
        self.df
            .column(columns::QC_FLAG)?
            .str()?
            .into_iter()
            .map(Flag::from_cell)
            .collect()
    }

    /// Replace the flag column; `flags` must be row-aligned
    pub fn set_flags(&mut self, flags: &[Flag]) -> Result<()> {
        if flags.len() != self.height() {
            return Err(QcError::RowCountMismatch {
                stage: "flag commit".to_string(),
                expected: self.height(),
                found: flags.len(),
            });
        }
        self.df.with_column(flag_column(flags))?;
        Ok(())
    }

    /// Rows where `mask` is true, in table order
    pub fn filter(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.height() {
            return Err(QcError::RowCountMismatch {
                stage: "filter".to_string(),
                expected: self.height(),
                found: mask.len(),
            });
        }
        let mask: BooleanChunked = mask.iter().copied().collect();
        Ok(Self {
            df: self.df.filter(&mask)?,
        })
    }

    /// `(observation_id, qc_flag)` pairs for the write-back side; unset reads as no QC
    pub fn flag_updates(&self) -> Result<Vec<FlagUpdate>> {
        let ids = self.ids()?;
        let flags = self.flags()?;
        Ok(ids
            .into_iter()
            .zip(flags)
            .map(|(observation_id, flag)| FlagUpdate {
                observation_id,
                qc_flag: flag.quality(),
            })
            .collect())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        self.write(path, ExportFormat::Csv)
    }

    /// Write the whole table, flags included
    pub fn write(&self, path: &Path, format: ExportFormat) -> Result<()> {
        let mut df = self.df.clone();
        write_frame(&mut df, path, format)
    }
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names()
        .iter()
        .any(|column| column.as_str() == name)
}

fn flag_column(flags: &[Flag]) -> Column {
    Column::new(
        columns::QC_FLAG.into(),
        flags.iter().map(|flag| flag.to_cell()).collect::<Vec<_>>(),
    )
}

fn non_null_u64(df: &DataFrame, name: &str) -> Result<Vec<u64>> {
    df.column(name)?
        .u64()?
        .into_iter()
        .map(|v| v.ok_or_else(|| QcError::invalid_column(name, "unexpected null")))
        .collect()
}

fn f64_or_nan(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    Ok(df
        .column(name)?
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Read a time column of any supported dtype as UTC microseconds
fn time_column_micros(column: &Column) -> Result<Vec<i64>> {
    let micros: Vec<Option<i64>> = match column.dtype() {
        DataType::String => column
            .str()?
            .into_iter()
            .map(|v| match v {
                Some(text) => parse_timestamp(text).map(Some),
                None => Ok(None),
            })
            .collect::<Result<_>>()?,
        DataType::Datetime(_, tz) => column
            .cast(&DataType::Datetime(TimeUnit::Microseconds, tz.clone()))?
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .collect(),
        dtype if dtype.is_integer() => column
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .collect(),
        other => {
            return Err(QcError::invalid_column(
                columns::PHENOMENON_TIME,
                format!("unsupported dtype {other}"),
            ));
        }
    };

    micros
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| QcError::invalid_column(columns::PHENOMENON_TIME, "null timestamp"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::QualityFlags;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample_observations() -> Vec<Observation> {
        let t0 = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        (0..4)
            .map(|i| {
                Observation::new(
                    100 + i,
                    1,
                    t0 + chrono::Duration::seconds(i as i64),
                    i as f64 * 2.345,
                    "salinity",
                )
                .with_position(3.0 + i as f64 * 1e-3, 51.0)
                .with_feature(10)
                .with_units("PSU")
            })
            .collect()
    }

    #[test]
    fn test_from_observations_round_trip_columns() {
        let table = ObservationTable::from_observations(&sample_observations()).unwrap();

        assert_eq!(table.height(), 4);
        assert_eq!(table.ids().unwrap(), vec![100, 101, 102, 103]);
        let times = table.timestamps().unwrap();
        assert_eq!(times[1] - times[0], 1_000_000);
        assert_eq!(table.flags().unwrap(), vec![Flag::Unset; 4]);
        assert!(table.regions().unwrap().is_none());
    }

    #[test]
    fn test_missing_required_column() {
        let df = df!(
            "id" => [1u64, 2],
            "datastream_id" => [1u64, 1],
        )
        .unwrap();
        let error = ObservationTable::new(df).unwrap_err();
        assert!(matches!(error, QcError::MissingColumn { column } if column == "phenomenon_time"));
    }

    #[test]
    fn test_string_times_and_flag_codes_normalize() {
        let df = df!(
            "id" => [1i64, 2, 3],
            "datastream_id" => [7i64, 7, 7],
            "phenomenon_time" => ["2023-01-01T00:00:00Z", "2023-01-01 00:00:01", "2023-01-01T00:00:02.5"],
            "result" => [1.0, 2.0, 3.0],
            "observation_type" => ["temperature", "temperature", "temperature"],
            "qc_flag" => [Some("BAD"), None, Some("nan")],
        )
        .unwrap();
        let table = ObservationTable::new(df).unwrap();

        let times = table.timestamps().unwrap();
        assert_eq!(times[1] - times[0], 1_000_000);
        assert_eq!(times[2] - times[0], 2_500_000);
        assert_eq!(
            table.flags().unwrap(),
            vec![Flag::Value(QualityFlags::Bad), Flag::Unset, Flag::Unset]
        );
        // optional columns are added as nulls
        assert_eq!(table.feature_ids().unwrap(), vec![None, None, None]);
        assert!(table.longitudes().unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut observations = sample_observations();
        observations[1].id = observations[0].id;
        let error = ObservationTable::from_observations(&observations).unwrap_err();
        assert!(matches!(error, QcError::InvalidColumn { .. }));
    }

    #[test]
    fn test_invalid_flag_rejected() {
        let mut df = ObservationTable::from_observations(&sample_observations())
            .unwrap()
            .into_data_frame();
        df.with_column(Column::new("qc_flag".into(), ["1", "2", "X", "4"]))
            .unwrap();
        assert!(matches!(
            ObservationTable::new(df),
            Err(QcError::InvalidFlag { .. })
        ));
    }

    #[test]
    fn test_filter_and_set_flags() {
        let mut table = ObservationTable::from_observations(&sample_observations()).unwrap();
        let subset = table.filter(&[true, false, true, false]).unwrap();
        assert_eq!(subset.ids().unwrap(), vec![100, 102]);

        let flags = vec![
            Flag::Value(QualityFlags::Good),
            Flag::Unset,
            Flag::Value(QualityFlags::Bad),
            Flag::Value(QualityFlags::Nominal),
        ];
        table.set_flags(&flags).unwrap();
        assert_eq!(table.flags().unwrap(), flags);

        let updates = table.flag_updates().unwrap();
        assert_eq!(updates[1].qc_flag, QualityFlags::NoQualityControl);
        assert_eq!(updates[3].qc_flag, QualityFlags::Nominal);

        assert!(matches!(
            table.set_flags(&flags[..2]),
            Err(QcError::RowCountMismatch { .. })
        ));
    }

    #[test]
    fn test_csv_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("observations.csv");

        let mut observations = sample_observations();
        observations[2].qc_flag = Some(QualityFlags::ProbablyBad);
        let table = ObservationTable::from_observations(&observations).unwrap();
        table.write_csv(&path).unwrap();

        let reread = ObservationTable::read_csv(&path).unwrap();
        assert_eq!(reread.ids().unwrap(), table.ids().unwrap());
        assert_eq!(reread.timestamps().unwrap(), table.timestamps().unwrap());
        assert_eq!(reread.flags().unwrap(), table.flags().unwrap());
    }

    #[test]
    fn test_glob_reads_multiple_files() {
        let temp_dir = TempDir::new().unwrap();
        let observations = sample_observations();
        ObservationTable::from_observations(&observations[..2])
            .unwrap()
            .write_csv(&temp_dir.path().join("part-1.csv"))
            .unwrap();
        ObservationTable::from_observations(&observations[2..])
            .unwrap()
            .write_csv(&temp_dir.path().join("part-2.csv"))
            .unwrap();

        let pattern = temp_dir.path().join("part-*.csv");
        let table = ObservationTable::read_csv_glob(&pattern.to_string_lossy()).unwrap();
        let mut ids = table.ids().unwrap();
        ids.sort_unstable();
        assert_eq!(ids, vec![100, 101, 102, 103]);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let base = parse_timestamp("2023-01-01T00:00:00Z").unwrap();
        assert_eq!(parse_timestamp("2023-01-01T01:00:00+01:00").unwrap(), base);
        assert_eq!(parse_timestamp("2023-01-01 00:00:00").unwrap(), base);
        assert!(parse_timestamp("yesterday").is_err());
    }
}
