use log::{debug, info, warn};
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

pub mod evaluator;
pub mod functions;
pub mod report;
pub mod syntax;
pub mod topics;

use evaluator::{EvaluationGrid, HeightField};
use report::Presentation;
use syntax::{Expr, Variable};
use topics::{Request, VariableMode};

#[derive(Parser)]
#[grammar = "expression.pest"]
pub struct ExpressionParser;

/// Syntax rules and sample inputs shown whenever the function text cannot
/// be parsed.
pub const PARSE_HELP_RULES: [&str; 4] = [
  "Use `**` for powers (example: `x**2`)",
  "Use `sin(x)`, not `sin x`",
  "Use `log(x)` for natural logarithm",
  "Allowed variables: x, y, z",
];

pub const PARSE_HELP_EXAMPLES: [&str; 4] = [
  "sin(x) + cos(y)",
  "x**2 + y**2",
  "exp(x*y)",
  "x**2 + y**2 + z**2",
];

pub const EVALUATION_HELP: &str = "The function cannot be evaluated on the selected domain.\n\n\
   This may happen due to division by zero or invalid values (e.g. log(x) for x ≤ 0).";

#[derive(Error, Debug)]
pub enum ParseError {
  #[error("Syntax error: {0}")]
  Syntax(#[from] Box<pest::error::Error<Rule>>),
  #[error("Empty input")]
  EmptyInput,
  #[error("Unknown identifier `{0}`")]
  UnknownIdentifier(String),
  #[error("Unknown function `{0}`")]
  UnknownFunction(String),
  #[error("`{0}` is a function and must be called with parentheses, e.g. {0}(x)")]
  MissingArguments(String),
  #[error("{name} expects {expected}, got {found}")]
  WrongArity {
    name: &'static str,
    expected: &'static str,
    found: usize,
  },
  #[error("Invalid number `{0}`")]
  InvalidNumber(String),
  #[error("Expression is too complex: {0}")]
  TooComplex(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
  /// The expression still depends on a variable the grid does not provide,
  /// so it cannot be turned into a function of (x, y).
  #[error("Variable `{0}` has no value on the x-y grid")]
  UnboundVariable(Variable),
}

#[derive(Error, Debug)]
pub enum ExplorerError {
  #[error("Invalid function input: {0}")]
  Parse(#[from] ParseError),
  #[error("Evaluation error: {0}")]
  Evaluation(#[from] EvaluationError),
}

impl ExplorerError {
  /// Headline shown above the explanation, mirroring what the user sees for
  /// each error kind.
  pub fn headline(&self) -> &'static str {
    match self {
      ExplorerError::Parse(_) => "❌ Invalid function input.",
      ExplorerError::Evaluation(_) => "⚠️ The function cannot be evaluated.",
    }
  }
}

impl ExpressionParser {
  pub fn parse_program(
    input: &str,
  ) -> Result<pest::iterators::Pairs<'_, Rule>, Box<pest::error::Error<Rule>>>
  {
    Self::parse(Rule::Program, input).map_err(Box::new)
  }
}

pub fn parse(
  input: &str,
) -> Result<pest::iterators::Pairs<'_, Rule>, Box<pest::error::Error<Rule>>> {
  ExpressionParser::parse_program(input)
}

/// Parse the function input field into an expression tree.
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
  if input.trim().is_empty() {
    return Err(ParseError::EmptyInput);
  }
  syntax::check_complexity(input)?;
  syntax::build_expression(parse(input)?)
}

/// Fix the third variable at `z0`. Identity when `mode` has two variables.
pub fn slice(expr: &Expr, mode: VariableMode, z0: f64) -> Expr {
  match mode {
    VariableMode::Two => expr.clone(),
    VariableMode::Three => expr.substitute(Variable::Z, &Expr::Real(z0)),
  }
}

/// Output of the shared part of the pipeline, consumed by every topic.
#[derive(Debug, Clone)]
pub struct Evaluated {
  /// The parsed input, before slicing.
  pub parsed: Expr,
  /// The two-variable expression that was sampled.
  pub surface: Expr,
  pub grid: EvaluationGrid,
  pub heights: HeightField,
}

/// Run parse, slice and grid evaluation for one request.
pub fn evaluate_request(request: &Request) -> Result<Evaluated, ExplorerError> {
  let parsed = parse_expression(&request.expression)?;
  debug!("parsed `{}` as {:?}", request.expression, parsed);

  let z0 = clamp_slice(request.slice_value);
  let surface = slice(&parsed, request.variables, z0);
  if request.variables == VariableMode::Three {
    debug!("sliced at z = {z0}: {surface}");
  }

  let grid = EvaluationGrid::default();
  let heights = evaluator::evaluate_grid(&surface, &grid)?;
  let undefined = heights.non_finite_count();
  if undefined > 0 {
    info!(
      "{undefined} of {} samples of `{surface}` are undefined",
      heights.len()
    );
  }

  Ok(Evaluated {
    parsed,
    surface,
    grid,
    heights,
  })
}

/// The full pipeline: evaluate the request, then build the selected topic's
/// presentation.
pub fn explore(request: &Request) -> Result<Presentation, ExplorerError> {
  let evaluated = evaluate_request(request)?;
  Ok(topics::present(request, &evaluated))
}

fn clamp_slice(z0: f64) -> f64 {
  let (lo, hi) = topics::SLICE_RANGE;
  if z0.is_nan() {
    warn!("slice value is NaN, using 0");
    return 0.0;
  }
  if z0 < lo || z0 > hi {
    warn!("slice value {z0} is outside [{lo}, {hi}], clamping");
  }
  z0.clamp(lo, hi)
}
