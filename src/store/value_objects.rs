use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Native identifier used by the backing store for concepts, roles, features
/// and patterns.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Nid(i32);

impl Nid {
    /// Wraps a raw native identifier.
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl From<i32> for Nid {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl Display for Nid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Nid {
    type Err = NidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i32>()
            .map(Self)
            .map_err(|_| NidError::Invalid {
                value: s.to_owned(),
            })
    }
}

/// Errors produced when parsing a [`Nid`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NidError {
    /// The provided text is not a native identifier.
    #[error("invalid native identifier: {value}")]
    Invalid { value: String },
}

#[cfg(test)]
mod tests {
    use super::{Nid, NidError};

    #[test]
    fn parses_signed_integers() {
        assert_eq!("42".parse::<Nid>(), Ok(Nid::new(42)));
        assert_eq!(" -7 ".parse::<Nid>(), Ok(Nid::new(-7)));
    }

    #[test]
    fn rejects_non_numeric_text() {
        let err = "owl:Thing".parse::<Nid>().expect_err("not numeric");
        assert!(matches!(err, NidError::Invalid { value } if value == "owl:Thing"));
    }
}
