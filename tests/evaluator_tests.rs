use multivar_explorer::evaluator::{
  evaluate_at, evaluate_grid, EvaluationGrid, GRID_SAMPLES,
};
use multivar_explorer::syntax::Variable;
use multivar_explorer::{parse_expression, EvaluationError};

mod evaluator_tests {
  use super::*;

  fn grid_values(input: &str) -> (EvaluationGrid, Vec<Vec<f64>>) {
    let grid = EvaluationGrid::default();
    let heights = evaluate_grid(&parse_expression(input).unwrap(), &grid).unwrap();
    (grid, heights.rows().to_vec())
  }

  #[test]
  fn default_grid_layout() {
    let grid = EvaluationGrid::default();
    assert_eq!(grid.samples(), GRID_SAMPLES);
    assert_eq!(grid.range(), (-5.0, 5.0));
    assert_eq!(grid.x().len(), 60);
    assert!(grid.x().iter().all(|row| row.len() == 60));

    // x follows the column, y follows the row
    assert_eq!(grid.x()[7][3], grid.axis()[3]);
    assert_eq!(grid.y()[7][3], grid.axis()[7]);
    assert_eq!(grid.x()[0][0], -5.0);
    assert_eq!(grid.y()[59][0], 5.0);
  }

  #[test]
  fn default_grid_has_no_zero_sample() {
    let grid = EvaluationGrid::default();
    assert!(grid.axis().iter().all(|&v| v != 0.0));
  }

  #[test]
  fn height_field_matches_grid() {
    let (grid, rows) = grid_values("x - y");
    assert_eq!(rows.len(), grid.samples());
    assert_eq!(rows[2][5], grid.axis()[5] - grid.axis()[2]);
  }

  #[test]
  fn constant_broadcasts() {
    let (_, rows) = grid_values("3");
    assert_eq!(rows.len(), 60);
    assert!(rows.iter().flatten().all(|&v| v == 3.0));
  }

  #[test]
  fn log_is_undefined_for_non_positive_x() {
    let (grid, rows) = grid_values("log(x)");
    for row in &rows {
      for (col, &v) in row.iter().enumerate() {
        if grid.axis()[col] <= 0.0 {
          assert!(v.is_nan(), "log({}) = {v}", grid.axis()[col]);
        } else {
          assert!(v.is_finite());
        }
      }
    }
  }

  #[test]
  fn sqrt_of_negative_is_nan() {
    assert!(evaluate_at(&parse_expression("sqrt(x)").unwrap(), -1.0, 0.0)
      .unwrap()
      .is_nan());
  }

  #[test]
  fn reciprocal_on_default_grid_is_finite() {
    let (_, rows) = grid_values("1/x");
    assert!(rows.iter().flatten().all(|v| v.is_finite()));
  }

  #[test]
  fn reciprocal_is_infinite_on_zero_column() {
    let grid = EvaluationGrid::new(61, -5.0, 5.0);
    let zero_col = grid.axis().iter().position(|&v| v == 0.0).unwrap();
    let heights =
      evaluate_grid(&parse_expression("1/x").unwrap(), &grid).unwrap();
    for row in heights.rows() {
      for (col, v) in row.iter().enumerate() {
        assert_eq!(v.is_finite(), col != zero_col);
      }
    }
    assert_eq!(heights.non_finite_count(), 61);
  }

  #[test]
  fn zero_over_zero_is_nan() {
    let v = evaluate_at(&parse_expression("x/y").unwrap(), 0.0, 0.0).unwrap();
    assert!(v.is_nan());
  }

  #[test]
  fn point_evaluation() {
    let expr = parse_expression("x*y + 2**x").unwrap();
    assert_eq!(evaluate_at(&expr, 2.0, 3.0).unwrap(), 10.0);
  }

  #[test]
  fn unbound_z_is_an_error() {
    let expr = parse_expression("x + z").unwrap();
    assert_eq!(
      evaluate_grid(&expr, &EvaluationGrid::default()),
      Err(EvaluationError::UnboundVariable(Variable::Z))
    );
  }

  #[test]
  fn evaluation_is_deterministic() {
    let expr = parse_expression("sin(x*y)/(x + y) + log(x**2)").unwrap();
    let grid = EvaluationGrid::default();
    let first = evaluate_grid(&expr, &grid).unwrap();
    let second = evaluate_grid(&expr, &grid).unwrap();
    let bits = |f: &multivar_explorer::evaluator::HeightField| {
      f.iter().map(f64::to_bits).collect::<Vec<_>>()
    };
    assert_eq!(bits(&first), bits(&second));
  }
}
