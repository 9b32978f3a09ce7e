//! The four views of an evaluated function.
//!
//! Every topic works from the same [`Evaluated`] result: the sliced
//! expression, its grid and its height field. Derivatives are always taken
//! of the sliced two-variable expression.

use log::{debug, warn};

use crate::evaluator::evaluate_at;
use crate::functions::calculus::{differential, gradient, Gradient};
use crate::functions::latex::to_latex;
use crate::functions::plot3d::{render_surface, SurfaceOptions};
use crate::functions::surface::explain_surface;
use crate::report::{Block, Presentation};
use crate::syntax::Expr;
use crate::Evaluated;

/// Allowed values for the z slice.
pub const SLICE_RANGE: (f64, f64) = (-5.0, 5.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum VariableMode {
  #[default]
  Two,
  Three,
}

impl VariableMode {
  pub fn label(self) -> &'static str {
    match self {
      VariableMode::Two => "Two variables: f(x, y)",
      VariableMode::Three => "Three variables: f(x, y, z)",
    }
  }

  /// Expression the input field starts with.
  pub fn default_expression(self) -> &'static str {
    match self {
      VariableMode::Two => "sin(x) + cos(y)",
      VariableMode::Three => "x**2 + y**2 + z**2",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Topic {
  #[default]
  Visualization,
  PartialDerivatives,
  Gradient,
  Differentials,
}

impl Topic {
  pub const ALL: [Topic; 4] = [
    Topic::Visualization,
    Topic::PartialDerivatives,
    Topic::Gradient,
    Topic::Differentials,
  ];

  pub fn label(self) -> &'static str {
    match self {
      Topic::Visualization => "Meaning & Visualization",
      Topic::PartialDerivatives => "Partial Derivatives",
      Topic::Gradient => "Gradient & Steepest Ascent",
      Topic::Differentials => "Differentials",
    }
  }
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone)]
pub struct Request {
  pub expression: String,
  pub variables: VariableMode,
  pub topic: Topic,
  /// Value substituted for z in three-variable mode.
  pub slice_value: f64,
  pub x0: f64,
  pub y0: f64,
  pub dx: f64,
  pub dy: f64,
  pub surface: SurfaceOptions,
}

impl Default for Request {
  fn default() -> Self {
    Self::new(VariableMode::Two.default_expression())
  }
}

impl Request {
  pub fn new(expression: impl Into<String>) -> Self {
    Self {
      expression: expression.into(),
      variables: VariableMode::Two,
      topic: Topic::Visualization,
      slice_value: 0.0,
      x0: 1.0,
      y0: 1.0,
      dx: 0.1,
      dy: 0.1,
      surface: SurfaceOptions::default(),
    }
  }

  pub fn with_variables(mut self, variables: VariableMode) -> Self {
    self.variables = variables;
    self
  }

  pub fn with_topic(mut self, topic: Topic) -> Self {
    self.topic = topic;
    self
  }

  pub fn with_slice(mut self, z0: f64) -> Self {
    self.slice_value = z0;
    self
  }
}

/// Build the presentation of `request.topic` for an evaluated request.
pub fn present(request: &Request, evaluated: &Evaluated) -> Presentation {
  debug!("presenting {:?}", request.topic);
  let mut blocks = vec![Block::Subheader(format!("🔹 {}", request.topic.label()))];

  match request.topic {
    Topic::Visualization => present_visualization(request, evaluated, &mut blocks),
    Topic::PartialDerivatives => present_partials(request, evaluated, &mut blocks),
    Topic::Gradient => present_gradient(request, evaluated, &mut blocks),
    Topic::Differentials => present_differentials(request, evaluated, &mut blocks),
  }

  Presentation::new(&request.expression, blocks)
}

fn chart(request: &Request, evaluated: &Evaluated) -> Block {
  Block::Chart {
    svg: render_surface(&evaluated.grid, &evaluated.heights, &request.surface),
  }
}

fn present_visualization(
  request: &Request,
  evaluated: &Evaluated,
  blocks: &mut Vec<Block>,
) {
  blocks.push(Block::Text(
    "The graph represents the surface **z = f(x, y)**. \
     Rotate and zoom the graph to understand how the function behaves."
      .to_string(),
  ));
  blocks.push(chart(request, evaluated));
  blocks.push(Block::Info(explain_surface(&evaluated.heights).to_string()));
}

fn present_partials(
  request: &Request,
  evaluated: &Evaluated,
  blocks: &mut Vec<Block>,
) {
  let Gradient { fx, fy } = gradient(&evaluated.surface);
  blocks.push(Block::Math(format!(
    r"\frac{{\partial f}}{{\partial x}} = {}",
    to_latex(&fx)
  )));
  blocks.push(Block::Math(format!(
    r"\frac{{\partial f}}{{\partial y}} = {}",
    to_latex(&fy)
  )));

  let (x0, y0) = (request.x0, request.y0);
  if let (Some(fx0), Some(fy0)) = (point_value(&fx, x0, y0), point_value(&fy, x0, y0)) {
    blocks.push(Block::Info(format!(
      "At (x₀, y₀) = ({}, {}): f_x = {}, f_y = {}",
      format_value(x0),
      format_value(y0),
      format_value(fx0),
      format_value(fy0)
    )));
  }

  blocks.push(Block::Text(
    "Partial derivatives describe how the surface changes \
     when one variable changes while the other is held constant."
      .to_string(),
  ));
  blocks.push(chart(request, evaluated));
}

fn present_gradient(
  request: &Request,
  evaluated: &Evaluated,
  blocks: &mut Vec<Block>,
) {
  let Gradient { fx, fy } = gradient(&evaluated.surface);
  blocks.push(Block::Math(format!(
    r"\nabla f = \left({}, {}\right)",
    to_latex(&fx),
    to_latex(&fy)
  )));
  blocks.push(Block::Text(
    "The gradient vector points in the direction of steepest ascent \
     on the surface."
      .to_string(),
  ));
  blocks.push(chart(request, evaluated));
}

fn present_differentials(
  request: &Request,
  evaluated: &Evaluated,
  blocks: &mut Vec<Block>,
) {
  let grad = gradient(&evaluated.surface);
  let (dx, dy) = (request.dx, request.dy);

  blocks.push(Block::Math(r"df = f_x dx + f_y dy".to_string()));
  blocks.push(Block::Math(format!(
    "df = {}",
    to_latex(&differential(&grad, dx, dy))
  )));

  let (x0, y0) = (request.x0, request.y0);
  let linear = point_value(&grad.fx, x0, y0)
    .zip(point_value(&grad.fy, x0, y0))
    .map(|(fx0, fy0)| fx0 * dx + fy0 * dy);
  let actual = point_value(&evaluated.surface, x0 + dx, y0 + dy)
    .zip(point_value(&evaluated.surface, x0, y0))
    .map(|(moved, here)| moved - here);
  if let (Some(linear), Some(actual)) = (linear, actual) {
    blocks.push(Block::Info(format!(
      "At (x₀, y₀) = ({}, {}) with dx = {}, dy = {}: df ≈ {}, actual change Δf = {}",
      format_value(x0),
      format_value(y0),
      format_value(dx),
      format_value(dy),
      format_value(linear),
      format_value(actual)
    )));
  }

  blocks.push(Block::Text(
    "The differential provides a linear approximation of how the \
     function value changes near a point."
      .to_string(),
  ));
  blocks.push(chart(request, evaluated));
}

fn point_value(expr: &Expr, x: f64, y: f64) -> Option<f64> {
  match evaluate_at(expr, x, y) {
    Ok(v) => Some(v),
    Err(err) => {
      warn!("cannot evaluate {expr} at ({x}, {y}): {err}");
      None
    }
  }
}

/// Up to four decimals, trailing zeros dropped.
pub fn format_value(v: f64) -> String {
  if !v.is_finite() {
    return "undefined".to_string();
  }
  let s = format!("{v:.4}");
  let s = s.trim_end_matches('0').trim_end_matches('.');
  match s {
    "-0" => "0".to_string(),
    _ => s.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn values_drop_trailing_zeros() {
    assert_eq!(format_value(2.0), "2");
    assert_eq!(format_value(0.1), "0.1");
    assert_eq!(format_value(-0.00001), "0");
    assert_eq!(format_value(f64::NAN), "undefined");
  }

  #[test]
  fn default_request_matches_input_defaults() {
    let r = Request::default();
    assert_eq!(r.expression, "sin(x) + cos(y)");
    assert_eq!((r.x0, r.y0, r.dx, r.dy), (1.0, 1.0, 0.1, 0.1));
  }
}
