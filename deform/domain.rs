use crate::types::{Point, Point1};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum DomainError {
    #[error("A domain needs at least one point.")]
    Empty,
    #[error("Domain range is invalid: start ({0}) must be less than or equal to end ({1}).")]
    InvalidRange(f64, f64),
    #[error("Domain point {index} has non-finite coordinates.")]
    NonFinitePoint { index: usize },
}

/// Serializable description of a regularly sampled 1-D interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainSpec {
    pub start: f64,
    pub end: f64,
    pub num_points: usize,
}

impl DomainSpec {
    pub fn build(&self) -> Result<DiscreteDomain<1>, DomainError> {
        DiscreteDomain::uniform(self.start, self.end, self.num_points)
    }
}

/// An ordered, finite set of points. Used as Nystrom landmarks and as the
/// set on which a transformation is exercised.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteDomain<const D: usize> {
    points: Vec<Point<D>>,
}

impl<const D: usize> DiscreteDomain<D> {
    pub fn from_points(points: Vec<Point<D>>) -> Result<Self, DomainError> {
        if points.is_empty() {
            return Err(DomainError::Empty);
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(DomainError::NonFinitePoint { index });
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point<D>] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point<D>> {
        self.points.iter()
    }
}

impl DiscreteDomain<1> {
    /// `num_points` evenly spaced points covering `start..=end`.
    pub fn uniform(start: f64, end: f64, num_points: usize) -> Result<Self, DomainError> {
        if num_points == 0 {
            return Err(DomainError::Empty);
        }
        if !(start <= end) {
            return Err(DomainError::InvalidRange(start, end));
        }
        let points = if num_points == 1 {
            vec![Point1::from(start)]
        } else {
            let step = (end - start) / (num_points - 1) as f64;
            (0..num_points)
                .map(|i| Point1::from(start + step * i as f64))
                .collect()
        };
        Self::from_points(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_domain_includes_both_ends() {
        let domain = DiscreteDomain::uniform(0.0, 2.0, 3).unwrap();
        let xs: Vec<f64> = domain.iter().map(|p| p.x()).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn invalid_domains_are_rejected() {
        assert_eq!(DiscreteDomain::uniform(0.0, 1.0, 0), Err(DomainError::Empty));
        assert_eq!(
            DiscreteDomain::uniform(1.0, 0.0, 4),
            Err(DomainError::InvalidRange(1.0, 0.0))
        );
        assert_eq!(
            DiscreteDomain::from_points(vec![Point1::from(0.0), Point1::from(f64::NAN)]),
            Err(DomainError::NonFinitePoint { index: 1 })
        );
    }

    #[test]
    fn spec_round_trip_builds_domain() {
        let spec = DomainSpec { start: -1.0, end: 1.0, num_points: 5 };
        let domain = spec.build().unwrap();
        assert_eq!(domain.len(), 5);
        assert_eq!(domain.points()[2].x(), 0.0);
    }
}
