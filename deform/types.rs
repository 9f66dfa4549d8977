use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, Index};

/// A fixed-dimension coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Point<const D: usize>(#[serde(with = "coords_serde")] pub [f64; D]);

pub type Point1 = Point<1>;
pub type Point2 = Point<2>;
pub type Point3 = Point<3>;

impl<const D: usize> Point<D> {
    pub fn new(coords: [f64; D]) -> Self {
        Self(coords)
    }

    pub fn origin() -> Self {
        Self([0.0; D])
    }

    /// Returns `None` when the slice length differs from `D`.
    pub fn from_slice(coords: &[f64]) -> Option<Self> {
        let coords: [f64; D] = coords.try_into().ok()?;
        Some(Self(coords))
    }

    pub fn coords(&self) -> &[f64; D] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    pub fn distance_squared(&self, other: &Self) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|c| c.is_finite())
    }
}

impl Point1 {
    #[inline]
    pub fn x(&self) -> f64 {
        self.0[0]
    }
}

impl From<f64> for Point1 {
    fn from(x: f64) -> Self {
        Self([x])
    }
}

impl<const D: usize> Index<usize> for Point<D> {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

// serde only derives array impls up to length 32 and not for const generics
mod coords_serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const D: usize>(
        coords: &[f64; D],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(coords.iter())
    }

    pub fn deserialize<'de, De: Deserializer<'de>, const D: usize>(
        deserializer: De,
    ) -> Result<[f64; D], De::Error> {
        let values = Vec::<f64>::deserialize(deserializer)?;
        let found = values.len();
        values
            .try_into()
            .map_err(|_| De::Error::custom(format!("expected {D} coordinates, found {found}")))
    }
}

/// One weight per retained eigenpair of a transformation space.
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterVector(pub Array1<f64>);

impl ParameterVector {
    pub fn new(values: Array1<f64>) -> Self {
        Self(values)
    }

    pub fn zeros(len: usize) -> Self {
        Self(Array1::zeros(len))
    }

    pub fn into_inner(self) -> Array1<f64> {
        self.0
    }

    pub fn as_view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }
}

impl Deref for ParameterVector {
    type Target = Array1<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Array1<f64>> for ParameterVector {
    fn from(values: Array1<f64>) -> Self {
        Self(values)
    }
}

impl From<Vec<f64>> for ParameterVector {
    fn from(values: Vec<f64>) -> Self {
        Self(Array1::from(values))
    }
}

impl From<ParameterVector> for Array1<f64> {
    fn from(values: ParameterVector) -> Self {
        values.0
    }
}

/// Ordered `(point, observed value)` pairs used for posterior conditioning.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingData<const D: usize>(pub Vec<(Point<D>, f64)>);

impl<const D: usize> TrainingData<D> {
    pub fn new(pairs: Vec<(Point<D>, f64)>) -> Self {
        Self(pairs)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn points(&self) -> Vec<Point<D>> {
        self.0.iter().map(|(p, _)| *p).collect()
    }

    pub fn values(&self) -> Array1<f64> {
        self.0.iter().map(|(_, v)| *v).collect()
    }
}

impl<const D: usize> FromIterator<(Point<D>, f64)> for TrainingData<D> {
    fn from_iter<I: IntoIterator<Item = (Point<D>, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
