//! Coordinates and prefixes
//!
//! A coordinate is a fixed-length tuple of string components. The same type
//! is used for prefixes (any leading sub-sequence, including the empty one);
//! the checks below decide which role a value plays.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Ordered tuple of string components.
///
/// Ordering is lexicographic by component, which is also the order in which
/// queries return results.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coordinate(Vec<String>);

impl Coordinate {
    /// Build a coordinate from any sequence of string-like components
    pub fn new<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(components.into_iter().map(Into::into).collect())
    }

    /// The empty prefix (addresses the whole tree)
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the first `len` components (or all of them if shorter)
    pub fn truncated(&self, len: usize) -> Self {
        Self(self.0.iter().take(len).cloned().collect())
    }

    /// Returns true if `prefix` is a leading sub-sequence of this coordinate
    pub fn starts_with(&self, prefix: &Coordinate) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn into_components(self) -> Vec<String> {
        self.0
    }

    /// Full coordinate check: exactly `dimensions` components
    pub fn validate_arity(&self, dimensions: usize) -> Result<(), ValidationError> {
        if self.len() != dimensions {
            return Err(ValidationError::Arity {
                expected: dimensions,
                actual: self.len(),
            });
        }
        Ok(())
    }

    /// Prefix check: between 0 and `dimensions` components
    pub fn validate_prefix(&self, dimensions: usize) -> Result<(), ValidationError> {
        if self.len() > dimensions {
            return Err(ValidationError::PrefixTooLong {
                dimensions,
                actual: self.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", component)?;
        }
        write!(f, ")")
    }
}

impl From<Vec<String>> for Coordinate {
    fn from(components: Vec<String>) -> Self {
        Self(components)
    }
}

impl From<Vec<&str>> for Coordinate {
    fn from(components: Vec<&str>) -> Self {
        Self::new(components)
    }
}

impl From<&[&str]> for Coordinate {
    fn from(components: &[&str]) -> Self {
        Self::new(components.iter().copied())
    }
}

impl From<&[String]> for Coordinate {
    fn from(components: &[String]) -> Self {
        Self(components.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for Coordinate {
    fn from(components: [&str; N]) -> Self {
        Self::new(components)
    }
}

impl From<&Coordinate> for Coordinate {
    fn from(coordinate: &Coordinate) -> Self {
        coordinate.clone()
    }
}

impl AsRef<[String]> for Coordinate {
    fn as_ref(&self) -> &[String] {
        &self.0
    }
}
