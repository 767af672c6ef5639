//! Identity types for cached players

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{RookError, RookResult};

/// Federation member id. This is the primary cache key component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(i32);

/// FIDE id. An alternate key that resolves to the same cached player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FideId(i32);

macro_rules! positive_id {
    ($ty:ident, $label:literal) => {
        impl $ty {
            /// Wrap a raw id, rejecting zero and negative values.
            pub fn new(raw: i32) -> RookResult<Self> {
                if raw <= 0 {
                    return Err(RookError::invalid_input(format!(
                        "{} must be a positive integer, got {}",
                        $label, raw
                    )));
                }
                Ok(Self(raw))
            }

            pub fn get(self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $ty {
            type Err = RookError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                let raw = trimmed.parse::<i32>().map_err(|_| {
                    RookError::invalid_input(format!("invalid {}: {:?}", $label, trimmed))
                })?;
                Self::new(raw)
            }
        }
    };
}

positive_id!(MemberId, "member id");
positive_id!(FideId, "FIDE id");

impl MemberId {
    /// Parse a comma separated id list such as `"1, 2,3"`.
    ///
    /// Empty segments are skipped; the first malformed entry fails the whole list.
    pub fn parse_list(raw: &str) -> RookResult<Vec<MemberId>> {
        raw.split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::parse)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_id_rejects_non_positive() {
        assert!(MemberId::new(0).is_err());
        assert!(MemberId::new(-4).is_err());
        assert_eq!(MemberId::new(12345).map(MemberId::get), Ok(12345));
    }

    #[test]
    fn test_member_id_from_str_trims() {
        let id: MemberId = " 42 ".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert!("abc".parse::<MemberId>().is_err());
        assert!("".parse::<FideId>().is_err());
    }

    #[test]
    fn test_parse_list_skips_empty_segments() {
        let ids = MemberId::parse_list("1, 2,,3,").unwrap();
        let raw: Vec<i32> = ids.into_iter().map(MemberId::get).collect();
        assert_eq!(raw, vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_list_fails_on_bad_entry() {
        let err = MemberId::parse_list("1,x,3").unwrap_err();
        assert!(matches!(err, RookError::InvalidInput(_)));
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&FideId::new(1503014).unwrap()).unwrap();
        assert_eq!(json, "1503014");
    }
}
