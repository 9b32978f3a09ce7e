use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};

use crate::{ParseError, Rule};

/// The only names that may appear as variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variable {
  X,
  Y,
  Z,
}

impl Variable {
  pub const ALL: [Variable; 3] = [Variable::X, Variable::Y, Variable::Z];

  pub fn name(self) -> &'static str {
    match self {
      Variable::X => "x",
      Variable::Y => "y",
      Variable::Z => "z",
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|v| v.name() == name)
  }
}

impl fmt::Display for Variable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathFunction {
  Sin,
  Cos,
  Tan,
  Exp,
  Log,
  Sqrt,
}

/// Closed dispatch table from input name to function. Anything not listed
/// here is rejected by the parser.
pub const ALLOWED_FUNCTIONS: [(&str, MathFunction); 6] = [
  ("sin", MathFunction::Sin),
  ("cos", MathFunction::Cos),
  ("tan", MathFunction::Tan),
  ("exp", MathFunction::Exp),
  ("log", MathFunction::Log),
  ("sqrt", MathFunction::Sqrt),
];

impl MathFunction {
  pub fn lookup(name: &str) -> Option<Self> {
    ALLOWED_FUNCTIONS
      .iter()
      .find(|(n, _)| *n == name)
      .map(|(_, f)| *f)
  }

  pub fn name(self) -> &'static str {
    match self {
      MathFunction::Sin => "sin",
      MathFunction::Cos => "cos",
      MathFunction::Tan => "tan",
      MathFunction::Exp => "exp",
      MathFunction::Log => "log",
      MathFunction::Sqrt => "sqrt",
    }
  }

  /// IEEE 754 evaluation: out-of-domain arguments give NaN, `log(0)` gives
  /// -inf.
  pub fn apply(self, arg: f64) -> f64 {
    match self {
      MathFunction::Sin => arg.sin(),
      MathFunction::Cos => arg.cos(),
      MathFunction::Tan => arg.tan(),
      MathFunction::Exp => arg.exp(),
      MathFunction::Log => arg.ln(),
      MathFunction::Sqrt => arg.sqrt(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
  Plus,
  Minus,
  Times,
  Divide,
  Power,
}

impl BinaryOperator {
  pub fn symbol(self) -> &'static str {
    match self {
      BinaryOperator::Plus => "+",
      BinaryOperator::Minus => "-",
      BinaryOperator::Times => "*",
      BinaryOperator::Divide => "/",
      BinaryOperator::Power => "**",
    }
  }

  fn precedence(self) -> u8 {
    match self {
      BinaryOperator::Plus | BinaryOperator::Minus => 1,
      BinaryOperator::Times | BinaryOperator::Divide => 2,
      BinaryOperator::Power => 4,
    }
  }
}

/// Symbolic expression over the variables x, y, z and the allowed
/// functions. Trees are never mutated in place; every transformation
/// returns a new tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Integer(i64),
  Real(f64),
  Identifier(Variable),
  Neg(Box<Expr>),
  BinaryOp {
    op: BinaryOperator,
    left: Box<Expr>,
    right: Box<Expr>,
  },
  FunctionCall {
    function: MathFunction,
    arg: Box<Expr>,
  },
}

impl Expr {
  pub fn var(v: Variable) -> Self {
    Expr::Identifier(v)
  }

  pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
    Expr::BinaryOp {
      op,
      left: Box::new(left),
      right: Box::new(right),
    }
  }

  pub fn plus(left: Expr, right: Expr) -> Self {
    Self::binary(BinaryOperator::Plus, left, right)
  }

  pub fn minus(left: Expr, right: Expr) -> Self {
    Self::binary(BinaryOperator::Minus, left, right)
  }

  pub fn times(left: Expr, right: Expr) -> Self {
    Self::binary(BinaryOperator::Times, left, right)
  }

  pub fn divide(left: Expr, right: Expr) -> Self {
    Self::binary(BinaryOperator::Divide, left, right)
  }

  pub fn power(base: Expr, exponent: Expr) -> Self {
    Self::binary(BinaryOperator::Power, base, exponent)
  }

  #[allow(clippy::should_implement_trait)]
  pub fn neg(operand: Expr) -> Self {
    Expr::Neg(Box::new(operand))
  }

  pub fn call(function: MathFunction, arg: Expr) -> Self {
    Expr::FunctionCall {
      function,
      arg: Box::new(arg),
    }
  }

  /// Numeric value of a literal, if this node is one.
  pub fn as_number(&self) -> Option<f64> {
    match self {
      Expr::Integer(n) => Some(*n as f64),
      Expr::Real(r) => Some(*r),
      _ => None,
    }
  }

  pub fn is_number(&self) -> bool {
    matches!(self, Expr::Integer(_) | Expr::Real(_))
  }

  pub fn free_variables(&self) -> BTreeSet<Variable> {
    let mut vars = BTreeSet::new();
    self.collect_variables(&mut vars);
    vars
  }

  fn collect_variables(&self, vars: &mut BTreeSet<Variable>) {
    match self {
      Expr::Integer(_) | Expr::Real(_) => {}
      Expr::Identifier(v) => {
        vars.insert(*v);
      }
      Expr::Neg(operand) => operand.collect_variables(vars),
      Expr::BinaryOp { left, right, .. } => {
        left.collect_variables(vars);
        right.collect_variables(vars);
      }
      Expr::FunctionCall { arg, .. } => arg.collect_variables(vars),
    }
  }

  /// True when the expression does not depend on `var`.
  pub fn is_constant_wrt(&self, var: Variable) -> bool {
    match self {
      Expr::Integer(_) | Expr::Real(_) => true,
      Expr::Identifier(v) => *v != var,
      Expr::Neg(operand) => operand.is_constant_wrt(var),
      Expr::BinaryOp { left, right, .. } => {
        left.is_constant_wrt(var) && right.is_constant_wrt(var)
      }
      Expr::FunctionCall { arg, .. } => arg.is_constant_wrt(var),
    }
  }

  /// Replace every occurrence of `var` with `value`.
  pub fn substitute(&self, var: Variable, value: &Expr) -> Expr {
    match self {
      Expr::Identifier(v) if *v == var => value.clone(),
      Expr::Integer(_) | Expr::Real(_) | Expr::Identifier(_) => self.clone(),
      Expr::Neg(operand) => Expr::neg(operand.substitute(var, value)),
      Expr::BinaryOp { op, left, right } => Expr::binary(
        *op,
        left.substitute(var, value),
        right.substitute(var, value),
      ),
      Expr::FunctionCall { function, arg } => {
        Expr::call(*function, arg.substitute(var, value))
      }
    }
  }

  /// Negations and negative literals, which need parentheses after a binary
  /// operator.
  fn is_signed(&self) -> bool {
    self.precedence() == 3
  }

  fn precedence(&self) -> u8 {
    match self {
      Expr::BinaryOp { op, .. } => op.precedence(),
      Expr::Neg(_) => 3,
      Expr::Integer(n) if *n < 0 => 3,
      Expr::Real(r) if r.is_sign_negative() => 3,
      _ => 5,
    }
  }
}

// --- input limits ---

/// Deepest parenthesis nesting accepted in the input.
pub const MAX_NESTING: usize = 64;
/// Most operator symbols (`+ - * / ^`, each `*` of `**` counted) accepted
/// in the input.
pub const MAX_OPERATORS: usize = 256;

/// Reject input whose tree would be too deep for the recursive passes
/// (tree building, evaluation, differentiation, printing). Runs on the raw
/// text, before pest recurses into it.
pub fn check_complexity(input: &str) -> Result<(), ParseError> {
  let mut depth = 0usize;
  let mut deepest = 0usize;
  let mut operators = 0usize;
  for c in input.chars() {
    match c {
      '(' => {
        depth += 1;
        deepest = deepest.max(depth);
      }
      ')' => depth = depth.saturating_sub(1),
      '+' | '-' | '*' | '/' | '^' => operators += 1,
      _ => {}
    }
  }

  if deepest > MAX_NESTING {
    return Err(ParseError::TooComplex(format!(
      "parentheses are nested {deepest} levels deep, at most {MAX_NESTING} are allowed"
    )));
  }
  if operators > MAX_OPERATORS {
    return Err(ParseError::TooComplex(format!(
      "{operators} operators, at most {MAX_OPERATORS} are allowed"
    )));
  }
  Ok(())
}

// --- pest pairs to expression tree ---

static PRATT: Lazy<PrattParser<Rule>> = Lazy::new(|| {
  PrattParser::new()
    .op(Op::infix(Rule::Plus, Assoc::Left) | Op::infix(Rule::Minus, Assoc::Left))
    .op(
      Op::infix(Rule::Times, Assoc::Left) | Op::infix(Rule::Divide, Assoc::Left),
    )
    .op(Op::prefix(Rule::Negate) | Op::prefix(Rule::UnaryPlus))
    .op(Op::infix(Rule::Power, Assoc::Right))
});

/// Convert the pairs of a successful `Rule::Program` parse into an
/// expression, checking the vocabulary on the way.
pub fn build_expression(mut program: Pairs<Rule>) -> Result<Expr, ParseError> {
  let expression = program
    .next()
    .and_then(|p| p.into_inner().next())
    .ok_or(ParseError::EmptyInput)?;
  build_operators(expression.into_inner())
}

fn build_operators(pairs: Pairs<Rule>) -> Result<Expr, ParseError> {
  PRATT
    .map_primary(build_primary)
    .map_prefix(|op, operand| {
      let operand = operand?;
      Ok(match op.as_rule() {
        Rule::Negate => Expr::neg(operand),
        _ => operand,
      })
    })
    .map_infix(|left, op, right| {
      let op = match op.as_rule() {
        Rule::Plus => BinaryOperator::Plus,
        Rule::Minus => BinaryOperator::Minus,
        Rule::Times => BinaryOperator::Times,
        Rule::Divide => BinaryOperator::Divide,
        _ => BinaryOperator::Power,
      };
      Ok(Expr::binary(op, left?, right?))
    })
    .parse(pairs)
}

fn build_primary(pair: Pair<Rule>) -> Result<Expr, ParseError> {
  match pair.as_rule() {
    Rule::Number => parse_number(pair.as_str()),
    Rule::Identifier => {
      let name = pair.as_str();
      if let Some(v) = Variable::from_name(name) {
        Ok(Expr::Identifier(v))
      } else if MathFunction::lookup(name).is_some() {
        Err(ParseError::MissingArguments(name.to_string()))
      } else {
        Err(ParseError::UnknownIdentifier(name.to_string()))
      }
    }
    Rule::FunctionCall => build_call(pair),
    Rule::Expression => build_operators(pair.into_inner()),
    _ => Err(ParseError::InvalidNumber(pair.as_str().to_string())),
  }
}

fn build_call(pair: Pair<Rule>) -> Result<Expr, ParseError> {
  let mut inner = pair.into_inner();
  let name = inner.next().map(|p| p.as_str()).unwrap_or_default();
  let function = MathFunction::lookup(name)
    .ok_or_else(|| ParseError::UnknownFunction(name.to_string()))?;
  let mut args = inner
    .map(|arg| build_operators(arg.into_inner()))
    .collect::<Result<Vec<_>, _>>()?;

  match (function, args.len()) {
    (_, 1) => Ok(Expr::call(function, args.remove(0))),
    // log(u, b) is the logarithm of u in base b
    (MathFunction::Log, 2) => {
      let base = args.remove(1);
      let value = args.remove(0);
      Ok(Expr::divide(
        Expr::call(MathFunction::Log, value),
        Expr::call(MathFunction::Log, base),
      ))
    }
    (MathFunction::Log, found) => Err(ParseError::WrongArity {
      name: function.name(),
      expected: "1 or 2 arguments",
      found,
    }),
    (_, found) => Err(ParseError::WrongArity {
      name: function.name(),
      expected: "exactly 1 argument",
      found,
    }),
  }
}

fn parse_number(text: &str) -> Result<Expr, ParseError> {
  let is_real = text.contains(['.', 'e', 'E']);
  if !is_real {
    if let Ok(n) = text.parse::<i64>() {
      return Ok(Expr::Integer(n));
    }
  }
  text
    .parse::<f64>()
    .map(Expr::Real)
    .map_err(|_| ParseError::InvalidNumber(text.to_string()))
}

// --- plain text output ---

/// Format a real the way it was typed: integral values keep a trailing
/// ".0" so they stay distinguishable from integers.
pub fn format_real(r: f64) -> String {
  if r.is_finite() && r == r.trunc() && r.abs() < 1e15 {
    format!("{r:.1}")
  } else {
    format!("{r}")
  }
}

impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Expr::Integer(n) => write!(f, "{n}"),
      Expr::Real(r) => f.write_str(&format_real(*r)),
      Expr::Identifier(v) => write!(f, "{v}"),
      Expr::Neg(operand) => {
        f.write_str("-")?;
        write_operand(f, operand, operand.precedence() < 2 || operand.is_signed())
      }
      Expr::BinaryOp { op, left, right } => {
        let prec = op.precedence();
        match op {
          BinaryOperator::Power => {
            write_operand(f, left, left.precedence() <= prec)?;
            f.write_str("**")?;
            write_operand(f, right, right.precedence() < prec)
          }
          BinaryOperator::Plus => {
            write_operand(f, left, left.precedence() < prec)?;
            // x + (-y) reads as x - y
            match right.as_ref() {
              Expr::Neg(inner) => {
                f.write_str(" - ")?;
                write_operand(f, inner, inner.precedence() <= prec)
              }
              Expr::Integer(n) if *n < 0 => write!(f, " - {}", n.unsigned_abs()),
              Expr::Real(r) if r.is_sign_negative() => {
                write!(f, " - {}", format_real(-r))
              }
              _ => {
                f.write_str(" + ")?;
                write_operand(f, right, right.precedence() < prec)
              }
            }
          }
          BinaryOperator::Minus => {
            write_operand(f, left, left.precedence() < prec)?;
            f.write_str(" - ")?;
            write_operand(f, right, right.precedence() <= prec || right.is_signed())
          }
          BinaryOperator::Times | BinaryOperator::Divide => {
            write_operand(f, left, left.precedence() < prec)?;
            f.write_str(op.symbol())?;
            write_operand(f, right, right.precedence() <= prec || right.is_signed())
          }
        }
      }
      Expr::FunctionCall { function, arg } => {
        write!(f, "{}({arg})", function.name())
      }
    }
  }
}

fn write_operand(
  f: &mut fmt::Formatter<'_>,
  expr: &Expr,
  parens: bool,
) -> fmt::Result {
  if parens {
    write!(f, "({expr})")
  } else {
    write!(f, "{expr}")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reals_keep_their_decimal_point() {
    assert_eq!(format_real(0.0), "0.0");
    assert_eq!(format_real(-2.0), "-2.0");
    assert_eq!(format_real(0.25), "0.25");
  }

  #[test]
  fn negative_literal_base_is_parenthesized() {
    let e = Expr::power(Expr::Integer(-2), Expr::var(Variable::X));
    assert_eq!(e.to_string(), "(-2)**x");
  }

  #[test]
  fn nested_minus_keeps_grouping() {
    let e = Expr::minus(
      Expr::var(Variable::X),
      Expr::minus(Expr::var(Variable::Y), Expr::var(Variable::Z)),
    );
    assert_eq!(e.to_string(), "x - (y - z)");
  }

  #[test]
  fn complexity_counts_depth_not_total_parentheses() {
    let flat = vec!["(x)"; 200].join("*");
    assert!(check_complexity(&flat).is_ok());
    let deep = format!("{}x{}", "(".repeat(65), ")".repeat(65));
    assert!(matches!(
      check_complexity(&deep),
      Err(ParseError::TooComplex(message)) if message.contains("65 levels")
    ));
  }
}
