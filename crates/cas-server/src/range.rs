//! `Range` header resolution.
//!
//! Only single `bytes` ranges are ever served as 206. Malformed headers,
//! other units and multi-range requests all fall through to a full 200.

/// Outcome of resolving a `Range` header against a content length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeResolution {
    /// Header absent or syntactically invalid.
    NoRange,
    /// Unit other than `bytes`, or more than one range requested.
    Full,
    /// One byte range, inclusive on both ends.
    Satisfiable {
        /// First byte offset.
        first: u64,
        /// Last byte offset.
        last: u64,
    },
    /// One byte range outside `[0, length)`.
    Unsatisfiable,
}

impl RangeResolution {
    /// Number of bytes in a satisfiable window.
    pub fn len(self) -> Option<u64> {
        match self {
            Self::Satisfiable { first, last } => Some(last - first + 1),
            _ => None,
        }
    }
}

/// A parsed range spec before bounds checking.
///
/// Offsets are signed so a `first-last` pair with `last < first`, or a
/// zero-length body, survive parsing and are rejected by the bounds check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawRange {
    first: i128,
    last: i128,
}

/// Resolve `header` against `length`.
pub fn resolve(header: Option<&str>, length: u64) -> RangeResolution {
    let Some(header) = header else {
        return RangeResolution::NoRange;
    };
    let Some((unit, ranges)) = parse_header(header, length) else {
        tracing::debug!(header, "Ignoring malformed Range header");
        return RangeResolution::NoRange;
    };
    if unit != "bytes" || ranges.len() != 1 {
        return RangeResolution::Full;
    }

    let RawRange { first, last } = ranges[0];
    match (u64::try_from(first), u64::try_from(last)) {
        (Ok(first), Ok(last)) if first <= last && last < length => {
            RangeResolution::Satisfiable { first, last }
        }
        _ => RangeResolution::Unsatisfiable,
    }
}

/// Split `unit=spec,spec,...` into a unit and its raw ranges.
fn parse_header(header: &str, length: u64) -> Option<(&str, Vec<RawRange>)> {
    let mut parts = header.split('=');
    let unit = parts.next()?;
    let specs = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let ranges = specs
        .split(',')
        .map(|spec| parse_spec(spec.trim(), i128::from(length)))
        .collect::<Option<Vec<_>>>()?;
    if ranges.is_empty() {
        return None;
    }
    Some((unit, ranges))
}

fn parse_spec(spec: &str, length: i128) -> Option<RawRange> {
    let (first, last) = spec.split_once('-')?;
    let (first, last) = (first.trim(), last.trim());
    match (first.is_empty(), last.is_empty()) {
        // "-suffix": the final `suffix` bytes.
        (true, false) => {
            let suffix = parse_offset(last)?;
            Some(RawRange {
                first: (length - suffix).max(0),
                last: length - 1,
            })
        }
        // "first-": everything from `first`.
        (false, true) => Some(RawRange {
            first: parse_offset(first)?,
            last: length - 1,
        }),
        (false, false) => Some(RawRange {
            first: parse_offset(first)?,
            last: parse_offset(last)?.min(length - 1),
        }),
        (true, true) => None,
    }
}

fn parse_offset(value: &str) -> Option<i128> {
    value.parse::<u64>().ok().map(i128::from)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sat(first: u64, last: u64) -> RangeResolution {
        RangeResolution::Satisfiable { first, last }
    }

    #[test]
    fn test_absent_header() {
        assert_eq!(resolve(None, 12), RangeResolution::NoRange);
    }

    #[test]
    fn test_first_last() {
        assert_eq!(resolve(Some("bytes=2-5"), 12), sat(2, 5));
        assert_eq!(resolve(Some("bytes=0-0"), 12), sat(0, 0));
        assert_eq!(sat(2, 5).len(), Some(4));
    }

    #[test]
    fn test_last_clamped_to_length() {
        assert_eq!(resolve(Some("bytes=4-100"), 12), sat(4, 11));
    }

    #[test]
    fn test_open_ended() {
        assert_eq!(resolve(Some("bytes=3-"), 12), sat(3, 11));
    }

    #[test]
    fn test_suffix() {
        assert_eq!(resolve(Some("bytes=-4"), 12), sat(8, 11));
        assert_eq!(resolve(Some("bytes=-100"), 12), sat(0, 11));
    }

    #[test]
    fn test_whitespace_around_spec() {
        assert_eq!(resolve(Some("bytes= 2-5 "), 12), sat(2, 5));
    }

    #[test]
    fn test_out_of_bounds_is_unsatisfiable() {
        assert_eq!(resolve(Some("bytes=20-30"), 12), RangeResolution::Unsatisfiable);
        assert_eq!(resolve(Some("bytes=12-"), 12), RangeResolution::Unsatisfiable);
        assert_eq!(resolve(Some("bytes=5-2"), 12), RangeResolution::Unsatisfiable);
    }

    #[test]
    fn test_empty_body_is_unsatisfiable() {
        assert_eq!(resolve(Some("bytes=0-"), 0), RangeResolution::Unsatisfiable);
        assert_eq!(resolve(Some("bytes=-5"), 0), RangeResolution::Unsatisfiable);
    }

    #[test]
    fn test_multiple_ranges_fall_back_to_full() {
        assert_eq!(resolve(Some("bytes=0-1,4-5"), 12), RangeResolution::Full);
    }

    #[test]
    fn test_other_unit_falls_back_to_full() {
        assert_eq!(resolve(Some("items=0-1"), 12), RangeResolution::Full);
        assert_eq!(resolve(Some("Bytes=0-1"), 12), RangeResolution::Full);
    }

    #[test]
    fn test_malformed_is_no_range() {
        for header in [
            "",
            "bytes",
            "bytes=",
            "bytes=abc",
            "bytes=1-x",
            "bytes=-",
            "bytes=0-1,",
            "bytes=0-1=2",
            "bytes=--5",
        ] {
            assert_eq!(
                resolve(Some(header), 12),
                RangeResolution::NoRange,
                "header {header:?}"
            );
        }
    }
}
