use crate::util::modify_tuple;

#[cfg(feature = "json_export")]
use json::JsonValue;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;

/// Coordinates closer together than this are considered to be at the same location
pub const COORD_UNIQUENESS_ACCURACY: f64 = 1e-12;

/// Number of coordinates stored inline before a [Point] spills onto the heap
pub(crate) const INLINE_DIM: usize = 3;

#[derive(Clone, Debug)]
/// Point in D-dimensional Space
///
/// Equality, ordering and hashing use each coordinate quantized to [COORD_UNIQUENESS_ACCURACY].
/// Two Points produced by different chains of arithmetic are the same location when they agree to that accuracy.
pub struct Point {
    coords: SmallVec<[f64; INLINE_DIM]>,
    keys: SmallVec<[CoordRep; INLINE_DIM]>,
}

impl Point {
    pub fn new(coords: impl Into<SmallVec<[f64; INLINE_DIM]>>) -> Self {
        let coords = coords.into();
        let keys = coords.iter().map(|c| CoordRep::from(*c)).collect();
        Self { coords, keys }
    }

    pub fn from_slice(coords: &[f64]) -> Self {
        Self::new(SmallVec::from_slice(coords))
    }

    /// The Point halfway between `a` and `b`
    pub fn between(a: &Self, b: &Self) -> Self {
        assert_eq!(
            a.dim(),
            b.dim(),
            "Points must have the same dimension; Cannot compute midpoint between {} and {}!",
            a,
            b
        );

        let half_widths: SmallVec<[f64; INLINE_DIM]> = a
            .coords
            .iter()
            .zip(b.coords.iter())
            .map(|(lo, hi)| (hi - lo) / 2.0)
            .collect();

        a.offset_by(&half_widths)
    }

    /// A new Point moved by `deltas` along each axis in turn
    pub fn offset_by(&self, deltas: &[f64]) -> Self {
        assert_eq!(self.dim(), deltas.len());

        Self::new(
            deltas
                .iter()
                .enumerate()
                .fold(self.coords.clone(), |acc, (axis, delta)| {
                    modify_tuple(&acc, axis, *delta)
                }),
        )
    }

    pub fn dim(&self) -> usize {
        self.coords.len()
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.coords.to_vec()
    }

    /// Compare the locations of two Points along a single axis (using the quantized representation)
    pub fn axis_order(&self, other: &Self, axis: usize) -> Ordering {
        self.keys[axis].cmp(&other.keys[axis])
    }

    /// Is this Point inside the (inclusive) axis-aligned box spanned by `low` and `high`
    pub fn within(&self, low: &Self, high: &Self) -> bool {
        (0..self.dim()).all(|axis| {
            self.axis_order(low, axis) != Ordering::Less
                && self.axis_order(high, axis) != Ordering::Greater
        })
    }
}

impl Index<usize> for Point {
    type Output = f64;
    fn index(&self, axis: usize) -> &Self::Output {
        &self.coords[axis]
    }
}

impl From<&[f64]> for Point {
    fn from(coords: &[f64]) -> Self {
        Self::from_slice(coords)
    }
}

impl<const N: usize> From<[f64; N]> for Point {
    fn from(coords: [f64; N]) -> Self {
        Self::from_slice(&coords)
    }
}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.keys.hash(state);
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.keys.eq(&other.keys)
    }
}

impl Eq for Point {}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.keys.cmp(&other.keys)
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(feature = "json_export")]
impl From<&Point> for JsonValue {
    fn from(point: &Point) -> Self {
        JsonValue::from(point.coords.to_vec())
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (axis, c) in self.coords.iter().enumerate() {
            if axis > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.10}", c)?;
        }
        write!(f, ")")
    }
}

#[derive(Hash, PartialEq, Eq, Clone, Copy, Debug)]
struct CoordRep {
    sign: bool,
    bits: u64,
}

impl CoordRep {
    pub fn from(value: f64) -> Self {
        let integer_part = value.abs().trunc();
        let fractional_rounded =
            (value.abs().fract() / COORD_UNIQUENESS_ACCURACY).round() * COORD_UNIQUENESS_ACCURACY;
        let total_rounded = integer_part + fractional_rounded;

        Self {
            // -0.0 and anything that rounds to zero share a single representation
            sign: value.is_sign_positive() || total_rounded == 0.0,
            bits: total_rounded.to_bits(),
        }
    }
}

impl Ord for CoordRep {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.sign, other.sign) {
            (true, true) => self.bits.cmp(&other.bits),
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, false) => self.bits.cmp(&other.bits).reverse(),
        }
    }
}

impl PartialOrd for CoordRep {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
