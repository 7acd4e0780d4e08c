//! Quality flag vocabulary and the merge algebra used to fold test results.
//!
//! Flags follow the NERC L20 (SeaDataNet) vocabulary. The ten numeric codes are
//! totally ordered; the three letter codes are only equal to themselves.

use crate::error::{QcError, Result};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Quality disposition of a single observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityFlags {
    /// No quality control has been applied yet
    NoQualityControl,
    Good,
    ProbablyGood,
    ProbablyBad,
    Bad,
    Changed,
    BelowDetection,
    InExcess,
    Interpolated,
    Missing,
    /// Letter code `A`
    PhenomenonUncertain,
    /// Letter code `B`
    Nominal,
    /// Letter code `Q`
    BelowLimitOfQuantification,
}

impl QualityFlags {
    /// Position in the numeric order, `None` for the letter codes
    pub fn numeric_code(self) -> Option<u8> {
        match self {
            QualityFlags::NoQualityControl => Some(0),
            QualityFlags::Good => Some(1),
            QualityFlags::ProbablyGood => Some(2),
            QualityFlags::ProbablyBad => Some(3),
            QualityFlags::Bad => Some(4),
            QualityFlags::Changed => Some(5),
            QualityFlags::BelowDetection => Some(6),
            QualityFlags::InExcess => Some(7),
            QualityFlags::Interpolated => Some(8),
            QualityFlags::Missing => Some(9),
            QualityFlags::PhenomenonUncertain
            | QualityFlags::Nominal
            | QualityFlags::BelowLimitOfQuantification => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.numeric_code().is_some()
    }

    /// L20 notation as written to the flag column
    pub fn code(self) -> &'static str {
        match self {
            QualityFlags::NoQualityControl => "0",
            QualityFlags::Good => "1",
            QualityFlags::ProbablyGood => "2",
            QualityFlags::ProbablyBad => "3",
            QualityFlags::Bad => "4",
            QualityFlags::Changed => "5",
            QualityFlags::BelowDetection => "6",
            QualityFlags::InExcess => "7",
            QualityFlags::Interpolated => "8",
            QualityFlags::Missing => "9",
            QualityFlags::PhenomenonUncertain => "A",
            QualityFlags::Nominal => "B",
            QualityFlags::BelowLimitOfQuantification => "Q",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QualityFlags::NoQualityControl => "NO_QUALITY_CONTROL",
            QualityFlags::Good => "GOOD",
            QualityFlags::ProbablyGood => "PROBABLY_GOOD",
            QualityFlags::ProbablyBad => "PROBABLY_BAD",
            QualityFlags::Bad => "BAD",
            QualityFlags::Changed => "CHANGED",
            QualityFlags::BelowDetection => "BELOW_DETECTION",
            QualityFlags::InExcess => "IN_EXCESS",
            QualityFlags::Interpolated => "INTERPOLATED",
            QualityFlags::Missing => "MISSING",
            QualityFlags::PhenomenonUncertain => "PHENOMENON_UNCERTAIN",
            QualityFlags::Nominal => "NOMINAL",
            QualityFlags::BelowLimitOfQuantification => "BELOW_LIMIT_OF_QUANTIFICATION",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            QualityFlags::NoQualityControl => "no quality control",
            QualityFlags::Good => "good value",
            QualityFlags::ProbablyGood => "probably good value",
            QualityFlags::ProbablyBad => "probably bad value",
            QualityFlags::Bad => "bad value",
            QualityFlags::Changed => "changed value",
            QualityFlags::BelowDetection => "value below detection",
            QualityFlags::InExcess => "value in excess",
            QualityFlags::Interpolated => "interpolated value",
            QualityFlags::Missing => "missing value",
            QualityFlags::PhenomenonUncertain => "value phenomenon uncertain",
            QualityFlags::Nominal => "nominal value",
            QualityFlags::BelowLimitOfQuantification => "value below limit of quantification",
        }
    }

    pub fn all_values() -> [QualityFlags; 13] {
        [
            QualityFlags::NoQualityControl,
            QualityFlags::Good,
            QualityFlags::ProbablyGood,
            QualityFlags::ProbablyBad,
            QualityFlags::Bad,
            QualityFlags::Changed,
            QualityFlags::BelowDetection,
            QualityFlags::InExcess,
            QualityFlags::Interpolated,
            QualityFlags::Missing,
            QualityFlags::PhenomenonUncertain,
            QualityFlags::Nominal,
            QualityFlags::BelowLimitOfQuantification,
        ]
    }

    /// Fold `other` into an accumulated flag.
    ///
    /// `NoQualityControl` is the identity. Two numeric codes merge to the worse
    /// one. A numeric code other than `NoQualityControl` wins over a letter code,
    /// and two different letter codes keep the accumulated value.
    pub fn merge(self, other: QualityFlags) -> QualityFlags {
        match (self.numeric_code(), other.numeric_code()) {
            (_, Some(0)) => self,
            (Some(0), _) => other,
            (Some(a), Some(b)) => {
                if b > a {
                    other
                } else {
                    self
                }
            }
            (None, Some(_)) => other,
            (Some(_), None) => self,
            (None, None) => self,
        }
    }

    /// True when the flag is numerically at or above `threshold`
    pub fn is_at_least(self, threshold: QualityFlags) -> bool {
        matches!(
            self.partial_cmp(&threshold),
            Some(Ordering::Greater | Ordering::Equal)
        )
    }
}

impl PartialOrd for QualityFlags {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.numeric_code(), other.numeric_code()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ if self == other => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl FromStr for QualityFlags {
    type Err = QcError;

    /// Accepts the L20 code ("4", "A") or the vocabulary name ("BAD", "probably_good")
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        QualityFlags::all_values()
            .into_iter()
            .find(|flag| {
                flag.code() == trimmed
                    || flag.name().eq_ignore_ascii_case(&trimmed.replace([' ', '-'], "_"))
            })
            .ok_or_else(|| QcError::InvalidFlag {
                value: s.to_string(),
            })
    }
}

impl TryFrom<u8> for QualityFlags {
    type Error = QcError;

    fn try_from(value: u8) -> Result<Self> {
        QualityFlags::all_values()
            .into_iter()
            .find(|flag| flag.numeric_code() == Some(value))
            .ok_or_else(|| QcError::InvalidFlag {
                value: value.to_string(),
            })
    }
}

impl fmt::Display for QualityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for QualityFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

struct QualityFlagsVisitor;

impl Visitor<'_> for QualityFlagsVisitor {
    type Value = QualityFlags;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an L20 flag code (0-9, A, B, Q) or flag name")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<QualityFlags, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<QualityFlags, E> {
        u8::try_from(v)
            .map_err(E::custom)
            .and_then(|code| QualityFlags::try_from(code).map_err(E::custom))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<QualityFlags, E> {
        u64::try_from(v)
            .map_err(E::custom)
            .and_then(|code| self.visit_u64(code))
    }
}

impl<'de> Deserialize<'de> for QualityFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(QualityFlagsVisitor)
    }
}

/// Flag column cell: either a vocabulary value or nothing recorded yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Flag {
    Value(QualityFlags),
    #[default]
    Unset,
}

impl Flag {
    /// Effective flag; an unset cell counts as `NoQualityControl`
    pub fn quality(self) -> QualityFlags {
        match self {
            Flag::Value(flag) => flag,
            Flag::Unset => QualityFlags::NoQualityControl,
        }
    }

    pub fn is_unset(self) -> bool {
        matches!(self, Flag::Unset)
    }

    pub fn merge(self, other: Flag) -> Flag {
        match (self, other) {
            (Flag::Unset, other) => other,
            (current, Flag::Unset) => current,
            (Flag::Value(a), Flag::Value(b)) => Flag::Value(a.merge(b)),
        }
    }

    /// Convert a raw flag-column cell. Empty cells and the legacy "nan"/"None"
    /// markers become `Unset`; anything else must be a valid code.
    pub fn from_cell(cell: Option<&str>) -> Result<Flag> {
        match cell.map(str::trim) {
            None | Some("") => Ok(Flag::Unset),
            Some(s) if s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("none") => {
                Ok(Flag::Unset)
            }
            Some(s) => s.parse().map(Flag::Value),
        }
    }

    pub fn to_cell(self) -> Option<&'static str> {
        match self {
            Flag::Value(flag) => Some(flag.code()),
            Flag::Unset => None,
        }
    }
}

impl From<QualityFlags> for Flag {
    fn from(flag: QualityFlags) -> Self {
        Flag::Value(flag)
    }
}

/// Per-observation audit trail: flag code -> labels of the steps that assigned it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagHistory {
    entries: BTreeMap<u64, BTreeMap<String, Vec<String>>>,
}

impl FlagHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, observation_id: u64, flag: QualityFlags, label: &str) {
        self.entries
            .entry(observation_id)
            .or_default()
            .entry(flag.code().to_string())
            .or_default()
            .push(label.to_string());
    }

    /// Labels that assigned `flag` to the observation, in run order
    pub fn labels(&self, observation_id: u64, flag: QualityFlags) -> &[String] {
        self.entries
            .get(&observation_id)
            .and_then(|by_flag| by_flag.get(flag.code()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn observation(&self, observation_id: u64) -> Option<&BTreeMap<String, Vec<String>>> {
        self.entries.get(&observation_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMERIC: [QualityFlags; 10] = [
        QualityFlags::NoQualityControl,
        QualityFlags::Good,
        QualityFlags::ProbablyGood,
        QualityFlags::ProbablyBad,
        QualityFlags::Bad,
        QualityFlags::Changed,
        QualityFlags::BelowDetection,
        QualityFlags::InExcess,
        QualityFlags::Interpolated,
        QualityFlags::Missing,
    ];

    #[test]
    fn test_numeric_order_is_total() {
        for pair in NUMERIC.windows(2) {
            assert!(pair[0] < pair[1], "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_letter_codes_are_incomparable() {
        let a = QualityFlags::PhenomenonUncertain;
        assert_eq!(a.partial_cmp(&a), Some(Ordering::Equal));
        assert_eq!(a.partial_cmp(&QualityFlags::Bad), None);
        assert_eq!(a.partial_cmp(&QualityFlags::Nominal), None);
        assert!(!a.is_at_least(QualityFlags::ProbablyBad));
    }

    #[test]
    fn test_merge_is_idempotent() {
        for a in QualityFlags::all_values() {
            for b in QualityFlags::all_values() {
                let once = a.merge(b);
                assert_eq!(once.merge(b), once, "merge({a}, {b})");
            }
        }
    }

    #[test]
    fn test_merge_numeric_takes_worse() {
        assert_eq!(
            QualityFlags::Good.merge(QualityFlags::Bad),
            QualityFlags::Bad
        );
        assert_eq!(
            QualityFlags::Bad.merge(QualityFlags::ProbablyGood),
            QualityFlags::Bad
        );
    }

    #[test]
    fn test_merge_letter_codes() {
        let nominal = QualityFlags::Nominal;
        // identity
        assert_eq!(nominal.merge(QualityFlags::NoQualityControl), nominal);
        assert_eq!(QualityFlags::NoQualityControl.merge(nominal), nominal);
        // numeric wins
        assert_eq!(nominal.merge(QualityFlags::Good), QualityFlags::Good);
        assert_eq!(QualityFlags::Good.merge(nominal), QualityFlags::Good);
        // accumulated letter code kept
        assert_eq!(
            nominal.merge(QualityFlags::PhenomenonUncertain),
            QualityFlags::Nominal
        );
    }

    #[test]
    fn test_parse_codes_and_names() {
        assert_eq!("4".parse::<QualityFlags>().unwrap(), QualityFlags::Bad);
        assert_eq!("BAD".parse::<QualityFlags>().unwrap(), QualityFlags::Bad);
        assert_eq!(
            "probably_good".parse::<QualityFlags>().unwrap(),
            QualityFlags::ProbablyGood
        );
        assert_eq!(
            "Q".parse::<QualityFlags>().unwrap(),
            QualityFlags::BelowLimitOfQuantification
        );
        assert!("11".parse::<QualityFlags>().is_err());
    }

    #[test]
    fn test_flag_cells() {
        assert_eq!(Flag::from_cell(None).unwrap(), Flag::Unset);
        assert_eq!(Flag::from_cell(Some("nan")).unwrap(), Flag::Unset);
        assert_eq!(
            Flag::from_cell(Some("1")).unwrap(),
            Flag::Value(QualityFlags::Good)
        );
        assert!(Flag::from_cell(Some("bogus")).is_err());
        assert_eq!(Flag::Unset.quality(), QualityFlags::NoQualityControl);
        assert_eq!(Flag::Value(QualityFlags::Bad).to_cell(), Some("4"));
    }

    #[test]
    fn test_flag_merge_unset_is_identity() {
        let bad = Flag::Value(QualityFlags::Bad);
        assert_eq!(Flag::Unset.merge(bad), bad);
        assert_eq!(bad.merge(Flag::Unset), bad);
        assert_eq!(Flag::Unset.merge(Flag::Unset), Flag::Unset);
    }

    #[test]
    fn test_deserialize_from_yaml_numbers_and_names() {
        let flags: Vec<QualityFlags> = serde_yaml::from_str("[4, BAD, \"2\", A]").unwrap();
        assert_eq!(
            flags,
            vec![
                QualityFlags::Bad,
                QualityFlags::Bad,
                QualityFlags::ProbablyGood,
                QualityFlags::PhenomenonUncertain
            ]
        );
    }

    #[test]
    fn test_history_records_labels_in_order() {
        let mut history = FlagHistory::new();
        history.record(7, QualityFlags::Bad, "range");
        history.record(7, QualityFlags::Bad, "gradient");
        history.record(7, QualityFlags::ProbablyGood, "region_nan");

        assert_eq!(history.len(), 1);
        assert_eq!(history.labels(7, QualityFlags::Bad), ["range", "gradient"]);
        assert!(history.labels(8, QualityFlags::Bad).is_empty());

        let json = history.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["7"]["4"][1], "gradient");
    }
}
