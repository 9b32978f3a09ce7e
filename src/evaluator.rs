//! Numeric evaluation of expressions over the sampling grid.
//!
//! All arithmetic is plain `f64`: division by zero produces an infinity,
//! out-of-domain function arguments produce NaN. Neither is an error; they
//! show up as holes in the surface.

use log::debug;

use crate::EvaluationError;
use crate::syntax::{BinaryOperator, Expr, Variable};

pub const GRID_SAMPLES: usize = 60;
pub const GRID_RANGE: (f64, f64) = (-5.0, 5.0);

/// `samples` evenly spaced values from `lo` to `hi`, both ends included
/// exactly.
pub fn linspace(lo: f64, hi: f64, samples: usize) -> Vec<f64> {
  match samples {
    0 => Vec::new(),
    1 => vec![lo],
    _ => {
      let last = (samples - 1) as f64;
      (0..samples)
        .map(|i| lo + (hi - lo) * i as f64 / last)
        .collect()
    }
  }
}

/// Square sampling grid in meshgrid layout: `x[row][col]` varies with the
/// column, `y[row][col]` varies with the row.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationGrid {
  axis: Vec<f64>,
  x: Vec<Vec<f64>>,
  y: Vec<Vec<f64>>,
}

impl Default for EvaluationGrid {
  fn default() -> Self {
    Self::new(GRID_SAMPLES, GRID_RANGE.0, GRID_RANGE.1)
  }
}

impl EvaluationGrid {
  pub fn new(samples: usize, lo: f64, hi: f64) -> Self {
    let axis = linspace(lo, hi, samples);
    let x = axis.iter().map(|_| axis.clone()).collect();
    let y = axis.iter().map(|&v| vec![v; samples]).collect();
    Self { axis, x, y }
  }

  pub fn samples(&self) -> usize {
    self.axis.len()
  }

  /// The sample positions shared by both axes.
  pub fn axis(&self) -> &[f64] {
    &self.axis
  }

  pub fn range(&self) -> (f64, f64) {
    match (self.axis.first(), self.axis.last()) {
      (Some(&lo), Some(&hi)) => (lo, hi),
      _ => GRID_RANGE,
    }
  }

  pub fn x(&self) -> &[Vec<f64>] {
    &self.x
  }

  pub fn y(&self) -> &[Vec<f64>] {
    &self.y
  }
}

/// Function values aligned 1:1 with an [`EvaluationGrid`]. Undefined points
/// hold NaN or an infinity.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
  values: Vec<Vec<f64>>,
}

impl HeightField {
  pub fn from_rows(values: Vec<Vec<f64>>) -> Self {
    Self { values }
  }

  pub fn rows(&self) -> &[Vec<f64>] {
    &self.values
  }

  pub fn get(&self, row: usize, col: usize) -> Option<f64> {
    self.values.get(row).and_then(|r| r.get(col)).copied()
  }

  pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
    self.values.iter().flatten().copied()
  }

  pub fn len(&self) -> usize {
    self.values.iter().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn non_finite_count(&self) -> usize {
    self.iter().filter(|v| !v.is_finite()).count()
  }

  /// Smallest and largest finite value, or `None` when nothing is finite.
  pub fn finite_range(&self) -> Option<(f64, f64)> {
    self.iter().filter(|v| v.is_finite()).fold(None, |acc, v| match acc {
      None => Some((v, v)),
      Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
  }
}

/// An expression checked to depend on x and y only, ready to be called at
/// numeric points.
#[derive(Debug, Clone)]
pub struct NumericFunction {
  expr: Expr,
}

impl NumericFunction {
  pub fn compile(expr: &Expr) -> Result<Self, EvaluationError> {
    if let Some(var) = expr
      .free_variables()
      .into_iter()
      .find(|v| !matches!(v, Variable::X | Variable::Y))
    {
      return Err(EvaluationError::UnboundVariable(var));
    }
    Ok(Self { expr: expr.clone() })
  }

  pub fn call(&self, x: f64, y: f64) -> f64 {
    eval(&self.expr, x, y)
  }
}

fn eval(expr: &Expr, x: f64, y: f64) -> f64 {
  match expr {
    Expr::Integer(n) => *n as f64,
    Expr::Real(r) => *r,
    Expr::Identifier(Variable::X) => x,
    Expr::Identifier(Variable::Y) => y,
    // compile() rejects z
    Expr::Identifier(Variable::Z) => f64::NAN,
    Expr::Neg(operand) => -eval(operand, x, y),
    Expr::BinaryOp { op, left, right } => {
      let l = eval(left, x, y);
      let r = eval(right, x, y);
      match op {
        BinaryOperator::Plus => l + r,
        BinaryOperator::Minus => l - r,
        BinaryOperator::Times => l * r,
        BinaryOperator::Divide => l / r,
        BinaryOperator::Power => l.powf(r),
      }
    }
    Expr::FunctionCall { function, arg } => function.apply(eval(arg, x, y)),
  }
}

/// Evaluate `expr` at a single point of the x-y plane.
pub fn evaluate_at(expr: &Expr, x: f64, y: f64) -> Result<f64, EvaluationError> {
  Ok(NumericFunction::compile(expr)?.call(x, y))
}

/// Sample `expr` at every grid point. Constant expressions fill the whole
/// field.
pub fn evaluate_grid(
  expr: &Expr,
  grid: &EvaluationGrid,
) -> Result<HeightField, EvaluationError> {
  let f = NumericFunction::compile(expr)?;
  debug!("evaluating {expr} on a {0}x{0} grid", grid.samples());

  let values = grid
    .x()
    .iter()
    .zip(grid.y())
    .map(|(xs, ys)| xs.iter().zip(ys).map(|(&x, &y)| f.call(x, y)).collect())
    .collect();
  Ok(HeightField::from_rows(values))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn linspace_hits_both_ends() {
    let v = linspace(-5.0, 5.0, 60);
    assert_eq!(v.len(), 60);
    assert_eq!(v[0], -5.0);
    assert_eq!(v[59], 5.0);
  }

  #[test]
  fn odd_sample_count_contains_zero() {
    let v = linspace(-5.0, 5.0, 61);
    assert_eq!(v[30], 0.0);
  }

  #[test]
  fn finite_range_skips_nan_and_infinity() {
    let field = HeightField::from_rows(vec![
      vec![f64::NAN, 1.0],
      vec![f64::INFINITY, -3.0],
    ]);
    assert_eq!(field.finite_range(), Some((-3.0, 1.0)));
    assert_eq!(field.non_finite_count(), 2);
  }
}
