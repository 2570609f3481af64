// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `NumericRange`.

use std::str::FromStr;

use crate::{StatusCode, UAString};

/// A parsed index range, used by Read / Write / monitored items to address a
/// slice of an array value or a substring of a string.
///
/// The text form is `min` or `min:max` with `min < max`; multiple dimensions
/// are separated by `,`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NumericRange {
    /// No range, the whole value.
    #[default]
    None,
    /// A single index.
    Index(u32),
    /// A range of indices, inclusive on both ends.
    Range(u32, u32),
    /// One range per array dimension.
    MultipleRanges(Vec<NumericRange>),
}

impl FromStr for NumericRange {
    type Err = StatusCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(NumericRange::None);
        }
        if s.contains(',') {
            let ranges = s
                .split(',')
                .map(Self::parse_dimension)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(NumericRange::MultipleRanges(ranges))
        } else {
            Self::parse_dimension(s)
        }
    }
}

impl NumericRange {
    /// Parse the wire form of an index range. A null string means no range.
    pub fn parse(range: &UAString) -> Result<NumericRange, StatusCode> {
        if range.is_null() {
            Ok(NumericRange::None)
        } else {
            NumericRange::from_str(range.as_ref())
        }
    }

    fn parse_dimension(s: &str) -> Result<NumericRange, StatusCode> {
        match s.split_once(':') {
            None => s
                .parse::<u32>()
                .map(NumericRange::Index)
                .map_err(|_| StatusCode::BadIndexRangeInvalid),
            Some((min, max)) => {
                let min = min
                    .parse::<u32>()
                    .map_err(|_| StatusCode::BadIndexRangeInvalid)?;
                let max = max
                    .parse::<u32>()
                    .map_err(|_| StatusCode::BadIndexRangeInvalid)?;
                if min >= max {
                    Err(StatusCode::BadIndexRangeInvalid)
                } else {
                    Ok(NumericRange::Range(min, max))
                }
            }
        }
    }

    /// Test if this range addresses the whole value.
    pub fn is_none(&self) -> bool {
        matches!(self, NumericRange::None)
    }

    /// Lower and upper bound of a one-dimensional range.
    pub fn as_min_max(&self) -> Option<(usize, usize)> {
        match self {
            NumericRange::None => None,
            NumericRange::Index(i) => Some((*i as usize, *i as usize)),
            NumericRange::Range(min, max) => Some((*min as usize, *max as usize)),
            NumericRange::MultipleRanges(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!("".parse::<NumericRange>().unwrap(), NumericRange::None);
        assert_eq!("1".parse::<NumericRange>().unwrap(), NumericRange::Index(1));
        assert_eq!(
            "1:2".parse::<NumericRange>().unwrap(),
            NumericRange::Range(1, 2)
        );
        assert_eq!(
            "0:2,3:4".parse::<NumericRange>().unwrap(),
            NumericRange::MultipleRanges(vec![
                NumericRange::Range(0, 2),
                NumericRange::Range(3, 4)
            ])
        );
    }

    #[test]
    fn parse_invalid() {
        for bad in ["x", "2:1", "1:1", "1:", ":2", "-1"] {
            assert_eq!(
                bad.parse::<NumericRange>().unwrap_err(),
                StatusCode::BadIndexRangeInvalid,
                "expected {bad} to fail"
            );
        }
    }
}
