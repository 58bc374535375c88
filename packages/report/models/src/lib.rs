#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Traffic incident cause taxonomy and travel directions.
//!
//! Every [`Cause`] is stored as an integer that is also a single bit, so a
//! set of causes can be expressed as a [`CauseMask`] and matched in SQL with
//! a bitwise AND.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The reason a traffic incident was reported.
///
/// Discriminants are distinct powers of two.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Cause {
    /// Collision between vehicles or with an obstacle
    Accident = 1,
    /// Heavy or stopped traffic
    Congestion = 2,
    /// Police presence or checkpoint
    Police = 4,
    /// Debris, animals, or other objects on the road
    Hazard = 8,
    /// Construction or maintenance work
    RoadWork = 16,
    /// Lane or road closure
    Closure = 32,
}

impl Cause {
    /// Returns the stored integer (and bit flag) for this cause.
    #[must_use]
    pub const fn value(self) -> i32 {
        self as i32
    }

    /// Returns this cause as a single-bit mask.
    #[must_use]
    pub const fn bit(self) -> u32 {
        self as u32
    }

    /// Creates a cause from its stored integer value.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not one of the known cause bits.
    pub const fn from_value(value: i32) -> Result<Self, InvalidCauseError> {
        match value {
            1 => Ok(Self::Accident),
            2 => Ok(Self::Congestion),
            4 => Ok(Self::Police),
            8 => Ok(Self::Hazard),
            16 => Ok(Self::RoadWork),
            32 => Ok(Self::Closure),
            _ => Err(InvalidCauseError { value }),
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Accident,
            Self::Congestion,
            Self::Police,
            Self::Hazard,
            Self::RoadWork,
            Self::Closure,
        ]
    }
}

/// Error returned when an integer does not name a [`Cause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCauseError {
    /// The rejected value.
    pub value: i32,
}

impl std::fmt::Display for InvalidCauseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid cause value {}", self.value)
    }
}

impl std::error::Error for InvalidCauseError {}

/// A set of [`Cause`]s packed into a bitmask.
///
/// The empty mask means "no cause filter".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CauseMask(u32);

impl CauseMask {
    /// Mask with every known cause bit set.
    pub const ALL: Self = Self(
        Cause::Accident.bit()
            | Cause::Congestion.bit()
            | Cause::Police.bit()
            | Cause::Hazard.bit()
            | Cause::RoadWork.bit()
            | Cause::Closure.bit(),
    );

    /// The empty mask.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds a mask from raw bits.
    ///
    /// # Errors
    ///
    /// Returns an error if any bit outside the known causes is set.
    pub const fn from_bits(bits: u32) -> Result<Self, InvalidCauseMaskError> {
        if bits & !Self::ALL.0 == 0 {
            Ok(Self(bits))
        } else {
            Err(InvalidCauseMaskError { bits })
        }
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether no cause bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether `cause` is part of this mask.
    #[must_use]
    pub const fn contains(self, cause: Cause) -> bool {
        self.0 & cause.bit() != 0
    }

    /// Returns a copy of this mask with `cause` added.
    #[must_use]
    pub const fn with(self, cause: Cause) -> Self {
        Self(self.0 | cause.bit())
    }

    /// Returns the causes set in this mask, in declaration order.
    #[must_use]
    pub fn causes(self) -> Vec<Cause> {
        Cause::all()
            .iter()
            .copied()
            .filter(|c| self.contains(*c))
            .collect()
    }
}

impl From<Cause> for CauseMask {
    fn from(cause: Cause) -> Self {
        Self(cause.bit())
    }
}

impl FromIterator<Cause> for CauseMask {
    fn from_iter<T: IntoIterator<Item = Cause>>(iter: T) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

/// Error returned when a mask contains bits that are not causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCauseMaskError {
    /// The rejected bits.
    pub bits: u32,
}

impl std::fmt::Display for InvalidCauseMaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid cause mask {}: unknown bits {:#x}",
            self.bits,
            self.bits & !CauseMask::ALL.0
        )
    }
}

impl std::error::Error for InvalidCauseMaskError {}

/// Direction of travel affected by an incident.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Both directions of travel
    #[default]
    Both = 0,
    /// Northbound
    North = 1,
    /// Eastbound
    East = 2,
    /// Southbound
    South = 3,
    /// Westbound
    West = 4,
}

impl Direction {
    /// Returns the stored integer for this direction.
    #[must_use]
    pub const fn value(self) -> i32 {
        self as i32
    }

    /// Creates a direction from its stored integer value.
    ///
    /// Unknown values fall back to [`Direction::Both`].
    #[must_use]
    pub const fn from_value(value: i32) -> Self {
        match value {
            1 => Self::North,
            2 => Self::East,
            3 => Self::South,
            4 => Self::West,
            _ => Self::Both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cause_values_are_distinct_bits() {
        let mut seen = 0u32;
        for cause in Cause::all() {
            let bit = cause.bit();
            assert_eq!(bit.count_ones(), 1, "{cause:?} is not a single bit");
            assert_eq!(seen & bit, 0, "{cause:?} overlaps another cause");
            seen |= bit;
        }
        assert_eq!(seen, CauseMask::ALL.bits());
    }

    #[test]
    fn cause_from_value_matches_value() {
        for cause in Cause::all() {
            assert_eq!(Cause::from_value(cause.value()), Ok(*cause));
        }
        assert!(Cause::from_value(0).is_err());
        assert!(Cause::from_value(3).is_err());
        assert!(Cause::from_value(64).is_err());
    }

    #[test]
    fn cause_parses_from_name() {
        assert_eq!("ROAD_WORK".parse::<Cause>(), Ok(Cause::RoadWork));
        assert_eq!(Cause::Accident.to_string(), "ACCIDENT");
        assert!("TRAFFIC_JAM".parse::<Cause>().is_err());
    }

    #[test]
    fn mask_contains_only_selected_causes() {
        let mask: CauseMask = [Cause::Accident, Cause::Police].into_iter().collect();
        assert_eq!(mask.bits(), 5);
        assert!(mask.contains(Cause::Accident));
        assert!(mask.contains(Cause::Police));
        assert!(!mask.contains(Cause::Congestion));
        assert_eq!(mask.causes(), vec![Cause::Accident, Cause::Police]);
    }

    #[test]
    fn mask_rejects_unknown_bits() {
        assert!(CauseMask::from_bits(0).unwrap().is_empty());
        assert_eq!(CauseMask::from_bits(63).unwrap(), CauseMask::ALL);
        let err = CauseMask::from_bits(64 | 1).unwrap_err();
        assert_eq!(err.bits, 65);
    }

    #[test]
    fn direction_falls_back_to_both() {
        assert_eq!(Direction::from_value(3), Direction::South);
        assert_eq!(Direction::from_value(99), Direction::Both);
        assert_eq!(Direction::West.value(), 4);
    }
}
