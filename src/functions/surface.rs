//! Plain-language reading of a height field.
//!
//! This is a coarse heuristic based only on the sign of the sampled values.
//! It says nothing reliable about actual extrema or saddle points.

use crate::evaluator::HeightField;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceShape {
  /// Every finite sample is >= 0.
  AbovePlane,
  /// Every finite sample is <= 0.
  BelowPlane,
  /// Samples of both signs, or no finite sample at all.
  Mixed,
}

impl SurfaceShape {
  pub fn explanation(self) -> &'static str {
    match self {
      SurfaceShape::AbovePlane => {
        "The surface lies above the xy-plane, suggesting a minimum point."
      }
      SurfaceShape::BelowPlane => {
        "The surface lies below the xy-plane, suggesting a maximum point."
      }
      SurfaceShape::Mixed => {
        "The surface has both positive and negative values. \
         This indicates varying curvature or a possible saddle point."
      }
    }
  }
}

/// Classify by the finite minimum and maximum; NaN and infinities are
/// ignored. A surface that is identically zero counts as above the plane.
pub fn classify(heights: &HeightField) -> SurfaceShape {
  match heights.finite_range() {
    Some((lo, _)) if lo >= 0.0 => SurfaceShape::AbovePlane,
    Some((_, hi)) if hi <= 0.0 => SurfaceShape::BelowPlane,
    _ => SurfaceShape::Mixed,
  }
}

pub fn explain_surface(heights: &HeightField) -> &'static str {
  classify(heights).explanation()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn field(values: &[f64]) -> HeightField {
    HeightField::from_rows(vec![values.to_vec()])
  }

  #[test]
  fn zero_surface_is_above() {
    assert_eq!(classify(&field(&[0.0, 0.0])), SurfaceShape::AbovePlane);
  }

  #[test]
  fn non_finite_values_are_ignored() {
    let f = field(&[f64::NAN, f64::NEG_INFINITY, -1.0, -0.5]);
    assert_eq!(classify(&f), SurfaceShape::BelowPlane);
  }

  #[test]
  fn undefined_everywhere_is_mixed() {
    assert_eq!(classify(&field(&[f64::NAN; 3])), SurfaceShape::Mixed);
  }
}
