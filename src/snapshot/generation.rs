// src/snapshot/generation.rs

//! Generation naming and ordering.
//!
//! A generation directory is named after the UTC second it was started
//! (`20261017T120000Z`). A second generation started within the same second
//! gets a numeric suffix (`20261017T120000Z-1`). Ordering is by stamp, then
//! suffix, so the one created last wins a tie.

use std::{cmp::Ordering, fmt};

use time::{format_description::FormatItem, macros::format_description, OffsetDateTime, PrimitiveDateTime};

const STAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day]T[hour][minute][second]Z");

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenerationName {
    stamp: String,
    seq: u32,
}

impl GenerationName {
    pub fn now() -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            stamp: now.format(STAMP_FORMAT).unwrap_or_else(|_| {
                format!("{}Z", now.unix_timestamp())
            }),
            seq: 0,
        }
    }

    /// Parses a directory name; anything that is not a generation (such as
    /// `latest`) yields `None`. Only the exact form [`fmt::Display`] writes is
    /// accepted, so `-0`, `-01` and `-+1` are rejected.
    pub fn parse(dir_name: &str) -> Option<Self> {
        let (stamp, seq) = match dir_name.split_once('-') {
            Some((stamp, seq)) => (stamp, parse_suffix(seq)?),
            None => (dir_name, 0),
        };
        PrimitiveDateTime::parse(stamp, STAMP_FORMAT).ok()?;
        Some(Self {
            stamp: stamp.to_string(),
            seq,
        })
    }

    /// The same stamp with the next suffix.
    pub fn next(&self) -> Self {
        Self {
            stamp: self.stamp.clone(),
            seq: self.seq + 1,
        }
    }
}

/// A suffix is a positive decimal without sign or leading zeros.
fn parse_suffix(raw: &str) -> Option<u32> {
    if raw.is_empty() || raw.starts_with('0') || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

impl fmt::Display for GenerationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.seq {
            0 => f.write_str(&self.stamp),
            seq => write!(f, "{}-{}", self.stamp, seq),
        }
    }
}

impl Ord for GenerationName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.stamp
            .cmp(&other.stamp)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for GenerationName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Picks the generation to trust when no latest pointer exists.
pub fn newest<I>(names: I) -> Option<GenerationName>
where
    I: IntoIterator<Item = GenerationName>,
{
    names.into_iter().max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_non_generations() {
        assert!(GenerationName::parse("latest").is_none());
        assert!(GenerationName::parse("20261017T120000Z-x").is_none());
        assert!(GenerationName::parse("20261317T120000Z").is_none());
    }

    #[test]
    fn test_parse_rejects_suffixes_display_never_writes() {
        for raw in [
            "20261017T120000Z-",
            "20261017T120000Z-0",
            "20261017T120000Z-01",
            "20261017T120000Z-+1",
        ] {
            assert!(GenerationName::parse(raw).is_none(), "{}", raw);
        }
        assert!(GenerationName::parse("20261017T120000Z-10").is_some());
    }

    #[test]
    fn test_display_round_trips() {
        for raw in ["20261017T120000Z", "20261017T120000Z-3"] {
            assert_eq!(GenerationName::parse(raw).unwrap().to_string(), raw);
        }
    }

    #[test]
    fn test_suffix_orders_numerically() {
        let base = GenerationName::parse("20261017T120000Z").unwrap();
        let second = GenerationName::parse("20261017T120000Z-2").unwrap();
        let tenth = GenerationName::parse("20261017T120000Z-10").unwrap();
        assert!(base < second);
        assert!(second < tenth);
        assert_eq!(newest(vec![tenth.clone(), base, second]), Some(tenth));
    }

    #[test]
    fn test_later_stamp_wins_over_suffix() {
        let earlier = GenerationName::parse("20261017T120000Z-5").unwrap();
        let later = GenerationName::parse("20261017T120001Z").unwrap();
        assert_eq!(newest(vec![later.clone(), earlier]), Some(later));
    }

    #[test]
    fn test_now_is_parseable() {
        let now = GenerationName::now();
        assert_eq!(GenerationName::parse(&now.to_string()), Some(now));
    }
}
