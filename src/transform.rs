//! Per-item transforms applied to each peer's task chunk.
//!
//! A transform must be pure: the same input always yields the same output,
//! with no shared state between calls. Closures of the shape
//! `Fn(&I) -> Result<O, TransformError>` are transforms too.

use crate::error::TransformError;
use std::ops::Mul;

/// An elementwise mapping from input items to results.
pub trait Transform<I, O>: Send + Sync {
    /// Map one item.
    fn apply(&self, item: &I) -> Result<O, TransformError>;
}

impl<I, O, F> Transform<I, O> for F
where
    F: Fn(&I) -> Result<O, TransformError> + Send + Sync,
{
    fn apply(&self, item: &I) -> Result<O, TransformError> {
        self(item)
    }
}

/// Sine of an angle given in whole degrees.
#[derive(Debug, Clone, Copy, Default)]
pub struct DegreesSine;

impl Transform<i32, f32> for DegreesSine {
    fn apply(&self, degrees: &i32) -> Result<f32, TransformError> {
        let radians = f64::from(*degrees) * 1f64.atan() / 45.0;
        let value = radians.sin() as f32;
        if !value.is_finite() {
            return Err(TransformError::NonFinite(degrees.to_string()));
        }
        Ok(value)
    }
}

/// Squares its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Square;

impl<T> Transform<T, T> for Square
where
    T: Copy + Mul<Output = T> + Send + Sync,
{
    fn apply(&self, item: &T) -> Result<T, TransformError> {
        Ok(*item * *item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrees_sine() {
        let cases = [(0, 0.0f32), (30, 0.5), (90, 1.0), (180, 0.0)];
        for (degrees, expected) in cases {
            let value = DegreesSine.apply(&degrees).unwrap();
            assert!((value - expected).abs() < 1e-6, "sin({}°) = {}", degrees, value);
        }
    }

    #[test]
    fn test_square() {
        assert_eq!(Transform::<i64, i64>::apply(&Square, &-7).unwrap(), 49);
        assert_eq!(Transform::<f64, f64>::apply(&Square, &1.5).unwrap(), 2.25);
    }

    #[test]
    fn test_closure_transform() {
        let halve = |x: &i32| -> Result<i32, TransformError> {
            if x % 2 != 0 {
                return Err(TransformError::OutOfDomain(format!("{} is odd", x)));
            }
            Ok(x / 2)
        };

        assert_eq!(halve.apply(&8).unwrap(), 4);
        assert!(matches!(halve.apply(&3), Err(TransformError::OutOfDomain(_))));
    }

    #[test]
    fn test_transform_is_deterministic() {
        for degrees in 0..=180 {
            assert_eq!(
                DegreesSine.apply(&degrees).unwrap().to_bits(),
                DegreesSine.apply(&degrees).unwrap().to_bits()
            );
        }
    }
}
