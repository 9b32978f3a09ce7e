use log::debug;

use crate::syntax::{BinaryOperator, Expr, MathFunction, Variable};

/// First partial derivatives of a two-variable surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
  pub fx: Expr,
  pub fy: Expr,
}

/// Symbolic partial derivative of `expr` with respect to `var`, simplified.
pub fn differentiate(expr: &Expr, var: Variable) -> Expr {
  let derivative = simplify(derive(expr, var));
  debug!("d/d{var} [{expr}] = {derivative}");
  derivative
}

pub fn gradient(expr: &Expr) -> Gradient {
  Gradient {
    fx: differentiate(expr, Variable::X),
    fy: differentiate(expr, Variable::Y),
  }
}

/// The differential `fx*dx + fy*dy` with the increments filled in.
pub fn differential(gradient: &Gradient, dx: f64, dy: f64) -> Expr {
  simplify(Expr::plus(
    Expr::times(gradient.fx.clone(), Expr::Real(dx)),
    Expr::times(gradient.fy.clone(), Expr::Real(dy)),
  ))
}

fn derive(expr: &Expr, var: Variable) -> Expr {
  match expr {
    Expr::Integer(_) | Expr::Real(_) => Expr::Integer(0),
    Expr::Identifier(v) => Expr::Integer(i64::from(*v == var)),
    Expr::Neg(a) => Expr::neg(derive(a, var)),
    Expr::BinaryOp { op, left, right } => {
      let (a, b) = (left.as_ref(), right.as_ref());
      match op {
        BinaryOperator::Plus => Expr::plus(derive(a, var), derive(b, var)),
        BinaryOperator::Minus => Expr::minus(derive(a, var), derive(b, var)),
        // (a*b)' = a'*b + a*b'
        BinaryOperator::Times => Expr::plus(
          Expr::times(derive(a, var), b.clone()),
          Expr::times(a.clone(), derive(b, var)),
        ),
        BinaryOperator::Divide => derive_quotient(a, b, var),
        BinaryOperator::Power => derive_power(expr, a, b, var),
      }
    }
    Expr::FunctionCall { function, arg } => {
      let u = arg.as_ref();
      let du = derive(u, var);
      match function {
        MathFunction::Sin => {
          Expr::times(Expr::call(MathFunction::Cos, u.clone()), du)
        }
        MathFunction::Cos => Expr::neg(Expr::times(
          Expr::call(MathFunction::Sin, u.clone()),
          du,
        )),
        // tan' = tan^2 + 1
        MathFunction::Tan => Expr::times(
          Expr::plus(
            Expr::power(
              Expr::call(MathFunction::Tan, u.clone()),
              Expr::Integer(2),
            ),
            Expr::Integer(1),
          ),
          du,
        ),
        MathFunction::Exp => Expr::times(expr.clone(), du),
        MathFunction::Log => Expr::divide(du, u.clone()),
        MathFunction::Sqrt => {
          Expr::divide(du, Expr::times(Expr::Integer(2), expr.clone()))
        }
      }
    }
  }
}

fn derive_quotient(a: &Expr, b: &Expr, var: Variable) -> Expr {
  if b.is_constant_wrt(var) {
    return Expr::divide(derive(a, var), b.clone());
  }
  if a.is_constant_wrt(var) {
    // (c/b)' = -c*b'/b^2
    return Expr::neg(Expr::divide(
      Expr::times(a.clone(), derive(b, var)),
      Expr::power(b.clone(), Expr::Integer(2)),
    ));
  }
  // (a/b)' = (a'*b - a*b') / b^2
  Expr::divide(
    Expr::minus(
      Expr::times(derive(a, var), b.clone()),
      Expr::times(a.clone(), derive(b, var)),
    ),
    Expr::power(b.clone(), Expr::Integer(2)),
  )
}

fn derive_power(expr: &Expr, base: &Expr, exp: &Expr, var: Variable) -> Expr {
  if exp.is_constant_wrt(var) {
    // (u^n)' = n*u^(n-1)*u'
    return Expr::times(
      Expr::times(
        exp.clone(),
        Expr::power(base.clone(), Expr::minus(exp.clone(), Expr::Integer(1))),
      ),
      derive(base, var),
    );
  }
  if base.is_constant_wrt(var) {
    // (a^v)' = a^v*log(a)*v'
    return Expr::times(
      Expr::times(expr.clone(), Expr::call(MathFunction::Log, base.clone())),
      derive(exp, var),
    );
  }
  // (u^v)' = u^v*(v'*log(u) + v*u'/u)
  Expr::times(
    expr.clone(),
    Expr::plus(
      Expr::times(
        derive(exp, var),
        Expr::call(MathFunction::Log, base.clone()),
      ),
      Expr::divide(Expr::times(exp.clone(), derive(base, var)), base.clone()),
    ),
  )
}

// --- simplification ---

fn is_const(expr: &Expr, val: i64) -> bool {
  match expr {
    Expr::Integer(n) => *n == val,
    Expr::Real(r) => *r == val as f64,
    _ => false,
  }
}

fn is_negative_number(expr: &Expr) -> bool {
  expr.as_number().is_some_and(|n| n < 0.0)
}

fn negate_number(expr: &Expr) -> Option<Expr> {
  match expr {
    Expr::Integer(n) => n.checked_neg().map(Expr::Integer),
    Expr::Real(r) => Some(Expr::Real(-r)),
    _ => None,
  }
}

/// Fold `a op b` for two literals. Integer arithmetic stays exact; anything
/// that cannot stay exact (overflow, inexact quotient) is left to the caller
/// except when a real is involved.
fn fold(op: BinaryOperator, a: &Expr, b: &Expr) -> Option<Expr> {
  if let (Expr::Integer(x), Expr::Integer(y)) = (a, b) {
    let (x, y) = (*x, *y);
    return match op {
      BinaryOperator::Plus => x.checked_add(y).map(Expr::Integer),
      BinaryOperator::Minus => x.checked_sub(y).map(Expr::Integer),
      BinaryOperator::Times => x.checked_mul(y).map(Expr::Integer),
      BinaryOperator::Divide => match x.checked_rem(y) {
        Some(0) => x.checked_div(y).map(Expr::Integer),
        _ => None,
      },
      BinaryOperator::Power => u32::try_from(y)
        .ok()
        .and_then(|e| x.checked_pow(e))
        .map(Expr::Integer),
    };
  }

  let (x, y) = (a.as_number()?, b.as_number()?);
  // an exact zero keeps the result exact
  match (op, a, b) {
    (BinaryOperator::Plus, Expr::Integer(0), other)
    | (BinaryOperator::Plus, other, Expr::Integer(0)) => {
      return Some(other.clone())
    }
    (BinaryOperator::Times, Expr::Integer(0), _)
    | (BinaryOperator::Times, _, Expr::Integer(0))
      if x.is_finite() && y.is_finite() =>
    {
      return Some(Expr::Integer(0))
    }
    _ => {}
  }
  let value = match op {
    BinaryOperator::Plus => x + y,
    BinaryOperator::Minus => x - y,
    BinaryOperator::Times => x * y,
    BinaryOperator::Divide => x / y,
    BinaryOperator::Power => x.powf(y),
  };
  // keep 1.0/0 and friends symbolic
  value.is_finite().then_some(Expr::Real(value))
}

/// Bottom-up algebraic cleanup: constant folding and removal of identity
/// elements. Produces the forms shown to the user, e.g. `2*x` rather than
/// `2*x**(2 - 1)*1`.
pub fn simplify(expr: Expr) -> Expr {
  match expr {
    Expr::Integer(_) | Expr::Real(_) | Expr::Identifier(_) => expr,
    Expr::Neg(a) => simplify_neg(simplify(*a)),
    Expr::BinaryOp { op, left, right } => {
      let a = simplify(*left);
      let b = simplify(*right);
      if let Some(folded) = fold(op, &a, &b) {
        return folded;
      }
      match op {
        BinaryOperator::Plus => simplify_plus(a, b),
        BinaryOperator::Minus => simplify_minus(a, b),
        BinaryOperator::Times => simplify_times(a, b),
        BinaryOperator::Divide => simplify_divide(a, b),
        BinaryOperator::Power => simplify_power(a, b),
      }
    }
    Expr::FunctionCall { function, arg } => {
      let arg = simplify(*arg);
      simplify_call(function, arg)
    }
  }
}

fn simplify_neg(a: Expr) -> Expr {
  if let Some(n) = negate_number(&a) {
    return n;
  }
  match a {
    Expr::Neg(inner) => *inner,
    // -(c*u) = (-c)*u for a literal c
    Expr::BinaryOp {
      op: BinaryOperator::Times,
      left,
      right,
    } if left.is_number() => match negate_number(&left) {
      Some(c) => simplify_times(c, *right),
      None => Expr::neg(Expr::times(*left, *right)),
    },
    // -(a - b) = b - a
    Expr::BinaryOp {
      op: BinaryOperator::Minus,
      left,
      right,
    } => Expr::minus(*right, *left),
    other => Expr::neg(other),
  }
}

fn simplify_plus(a: Expr, b: Expr) -> Expr {
  if is_const(&a, 0) {
    return b;
  }
  if is_const(&b, 0) {
    return a;
  }
  if let Some(combined) = combine_like_terms(BinaryOperator::Plus, &a, &b) {
    return combined;
  }
  match (a, b) {
    (a, Expr::Neg(b)) => simplify_minus(a, *b),
    (Expr::Neg(a), b) => simplify_minus(b, *a),
    (a, b) if is_negative_number(&b) => match negate_number(&b) {
      Some(nb) => Expr::minus(a, nb),
      None => Expr::plus(a, b),
    },
    // constants go last, as in x**2 + 1
    (a, b) if a.is_number() && !b.is_number() => simplify_plus(b, a),
    (a, b) => Expr::plus(a, b),
  }
}

fn simplify_minus(a: Expr, b: Expr) -> Expr {
  if is_const(&b, 0) {
    return a;
  }
  if is_const(&a, 0) {
    return simplify_neg(b);
  }
  if a == b {
    return Expr::Integer(0);
  }
  if let Some(combined) = combine_like_terms(BinaryOperator::Minus, &a, &b) {
    return combined;
  }
  match b {
    Expr::Neg(b) => simplify_plus(a, *b),
    b if is_negative_number(&b) => match negate_number(&b) {
      Some(nb) => simplify_plus(a, nb),
      None => Expr::minus(a, b),
    },
    b => Expr::minus(a, b),
  }
}

/// `2*u + u` is `3*u`; `u*v - 3*u*v` is `-2*u*v`.
fn combine_like_terms(op: BinaryOperator, a: &Expr, b: &Expr) -> Option<Expr> {
  if a.is_number() || b.is_number() {
    return None;
  }
  let (ca, ra) = split_coefficient(a);
  let (cb, rb) = split_coefficient(b);
  if ra != rb {
    return None;
  }
  let c = fold(op, &ca, &cb)?;
  Some(simplify_times(c, ra))
}

/// Split a term into its numeric coefficient and the rest, `1` when there
/// is none.
fn split_coefficient(term: &Expr) -> (Expr, Expr) {
  match term {
    Expr::Neg(inner) => (Expr::Integer(-1), inner.as_ref().clone()),
    _ => leading_coefficient(term)
      .unwrap_or_else(|| (Expr::Integer(1), term.clone())),
  }
}

/// The literal at the far left of a product chain such as `2*x**2*y`.
fn leading_coefficient(term: &Expr) -> Option<(Expr, Expr)> {
  match term {
    Expr::BinaryOp {
      op: BinaryOperator::Times,
      left,
      right,
    } => {
      if left.is_number() {
        Some((left.as_ref().clone(), right.as_ref().clone()))
      } else {
        let (c, rest) = leading_coefficient(left)?;
        Some((c, Expr::times(rest, right.as_ref().clone())))
      }
    }
    _ => None,
  }
}

fn simplify_times(a: Expr, b: Expr) -> Expr {
  if is_const(&a, 0) || is_const(&b, 0) {
    return Expr::Integer(0);
  }
  if is_const(&a, 1) {
    return b;
  }
  if is_const(&b, 1) {
    return a;
  }
  if is_const(&a, -1) {
    return simplify_neg(b);
  }
  if is_const(&b, -1) {
    return simplify_neg(a);
  }
  let mut product = Product::new();
  product.absorb(a, false);
  product.absorb(b, false);
  product.build()
}

fn simplify_divide(a: Expr, b: Expr) -> Expr {
  if is_const(&a, 0) && !is_const(&b, 0) {
    return Expr::Integer(0);
  }
  if is_const(&b, 1) {
    return a;
  }
  if a == b && !a.is_number() {
    return Expr::Integer(1);
  }
  let mut product = Product::new();
  product.absorb(a, false);
  product.absorb(b, true);
  product.build()
}

/// A product flattened to `coefficient / divisor * base**exponent * ...`.
/// Factors with equal bases share one entry whose exponents are summed,
/// so `x**4*x` becomes `x**5` and `y/(x*y)` becomes `1/x`.
struct Product {
  coefficient: Expr,
  divisor: Expr,
  /// `(base, exponent)` in first-seen order.
  factors: Vec<(Expr, Expr)>,
}

impl Product {
  fn new() -> Self {
    Product {
      coefficient: Expr::Integer(1),
      divisor: Expr::Integer(1),
      factors: Vec::new(),
    }
  }

  fn absorb(&mut self, expr: Expr, inverted: bool) {
    match expr {
      number if number.is_number() => self.scale(number, inverted),
      Expr::Neg(inner) => {
        self.scale(Expr::Integer(-1), false);
        self.absorb(*inner, inverted);
      }
      Expr::BinaryOp {
        op: BinaryOperator::Times,
        left,
        right,
      } => {
        self.absorb(*left, inverted);
        self.absorb(*right, inverted);
      }
      Expr::BinaryOp {
        op: BinaryOperator::Divide,
        left,
        right,
      } => {
        self.absorb(*left, inverted);
        self.absorb(*right, !inverted);
      }
      // numeric bases such as 2**x stay whole
      Expr::BinaryOp {
        op: BinaryOperator::Power,
        left,
        right,
      } if !left.is_number() => {
        let exp = if inverted { simplify_neg(*right) } else { *right };
        self.push(*left, exp);
      }
      other => {
        let exp = Expr::Integer(if inverted { -1 } else { 1 });
        self.push(other, exp);
      }
    }
  }

  fn scale(&mut self, number: Expr, inverted: bool) {
    let slot = if inverted {
      &mut self.divisor
    } else {
      &mut self.coefficient
    };
    match fold(BinaryOperator::Times, slot, &number) {
      Some(scaled) => *slot = scaled,
      None => {
        let exp = Expr::Integer(if inverted { -1 } else { 1 });
        self.push(number, exp);
      }
    }
  }

  fn push(&mut self, base: Expr, exp: Expr) {
    let Some(i) = self.factors.iter().position(|(b, _)| *b == base) else {
      self.factors.push((base, exp));
      return;
    };
    let total = &mut self.factors[i].1;
    let sum = Expr::plus(std::mem::replace(total, Expr::Integer(0)), exp);
    *total = simplify(sum);
  }

  /// Bring `coefficient / divisor` to lowest terms with a positive divisor.
  fn reduce(&mut self) {
    if is_const(&self.divisor, 1) {
      return;
    }
    if let Some(q) = fold(BinaryOperator::Divide, &self.coefficient, &self.divisor)
    {
      self.coefficient = q;
      self.divisor = Expr::Integer(1);
      return;
    }
    if let (Expr::Integer(n), Expr::Integer(m)) = (&self.coefficient, &self.divisor)
    {
      let (mut n, mut m) = (*n, *m);
      if let Ok(g) = i64::try_from(gcd(n.unsigned_abs(), m.unsigned_abs())) {
        if g > 1 {
          n /= g;
          m /= g;
        }
      }
      if m < 0 {
        if let (Some(nn), Some(nm)) = (n.checked_neg(), m.checked_neg()) {
          n = nn;
          m = nm;
        }
      }
      self.coefficient = Expr::Integer(n);
      self.divisor = Expr::Integer(m);
    }
  }

  fn build(mut self) -> Expr {
    self.reduce();
    let mut numerator = Vec::new();
    let mut denominator = Vec::new();
    for (base, exp) in self.factors {
      if is_const(&exp, 0) {
        continue;
      }
      let (side, exp) =
        if is_negative_number(&exp) || matches!(exp, Expr::Neg(_)) {
          (&mut denominator, simplify_neg(exp))
        } else {
          (&mut numerator, exp)
        };
      let factor = simplify_power(base, exp);
      if !is_const(&factor, 1) {
        side.push(factor);
      }
    }

    if numerator.is_empty() && denominator.is_empty() {
      return if is_const(&self.divisor, 1) {
        self.coefficient
      } else {
        Expr::divide(self.coefficient, self.divisor)
      };
    }

    let negate = is_const(&self.coefficient, -1);
    let mut top = Vec::new();
    if (!negate && !is_const(&self.coefficient, 1)) || numerator.is_empty() {
      top.push(if negate {
        Expr::Integer(1)
      } else {
        self.coefficient
      });
    }
    top.extend(numerator);
    let mut bottom = Vec::new();
    if !is_const(&self.divisor, 1) {
      bottom.push(self.divisor);
    }
    bottom.extend(denominator);

    let mut result = chain(top);
    if !bottom.is_empty() {
      result = Expr::divide(result, chain(bottom));
    }
    if negate {
      Expr::neg(result)
    } else {
      result
    }
  }
}

/// Left-associated product of a non-empty factor list.
fn chain(factors: Vec<Expr>) -> Expr {
  let mut factors = factors.into_iter();
  let first = factors.next().unwrap_or(Expr::Integer(1));
  factors.fold(first, Expr::times)
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
  while b != 0 {
    (a, b) = (b, a % b);
  }
  a
}

fn simplify_power(base: Expr, exp: Expr) -> Expr {
  if is_const(&exp, 0) {
    return Expr::Integer(1);
  }
  if is_const(&exp, 1) {
    return base;
  }
  if is_const(&base, 1) {
    return Expr::Integer(1);
  }
  // (u^a)^b = u^(a*b) for integer a and b
  if let (
    Expr::BinaryOp {
      op: BinaryOperator::Power,
      left,
      right,
    },
    Expr::Integer(m),
  ) = (&base, &exp)
  {
    if let Expr::Integer(n) = right.as_ref() {
      if let Some(k) = n.checked_mul(*m) {
        return simplify_power(left.as_ref().clone(), Expr::Integer(k));
      }
    }
  }
  Expr::power(base, exp)
}

fn simplify_call(function: MathFunction, arg: Expr) -> Expr {
  let exact = match function {
    MathFunction::Sin | MathFunction::Tan | MathFunction::Sqrt
      if is_const(&arg, 0) =>
    {
      Some(0)
    }
    MathFunction::Cos | MathFunction::Exp if is_const(&arg, 0) => Some(1),
    MathFunction::Log | MathFunction::Sqrt if is_const(&arg, 1) => {
      Some(i64::from(function == MathFunction::Sqrt))
    }
    _ => None,
  };
  match exact {
    Some(n) => Expr::Integer(n),
    None => Expr::call(function, arg),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn x() -> Expr {
    Expr::var(Variable::X)
  }

  #[test]
  fn nested_coefficients_fold() {
    let e = Expr::times(Expr::Integer(2), Expr::times(Expr::Integer(3), x()));
    assert_eq!(simplify(e), Expr::times(Expr::Integer(6), x()));
  }

  #[test]
  fn negated_coefficient_moves_into_literal() {
    let e = Expr::neg(Expr::times(Expr::Integer(2), x()));
    assert_eq!(simplify(e), Expr::times(Expr::Integer(-2), x()));
  }

  #[test]
  fn inexact_integer_quotient_stays_symbolic() {
    let e = Expr::divide(Expr::Integer(1), Expr::Integer(2));
    assert_eq!(simplify(e.clone()), e);
  }

  #[test]
  fn division_by_zero_literal_is_not_folded() {
    let e = Expr::divide(Expr::Real(1.0), Expr::Integer(0));
    assert_eq!(simplify(e.clone()), e);
  }

  #[test]
  fn equal_bases_collect_exponents() {
    let e = Expr::times(
      Expr::times(Expr::Integer(3), Expr::power(x(), Expr::Integer(4))),
      Expr::times(Expr::Integer(2), x()),
    );
    assert_eq!(
      simplify(e),
      Expr::times(Expr::Integer(6), Expr::power(x(), Expr::Integer(5)))
    );
  }

  #[test]
  fn common_factor_cancels_in_quotient() {
    let y = Expr::var(Variable::Y);
    let e = Expr::divide(y.clone(), Expr::times(x(), y));
    assert_eq!(simplify(e), Expr::divide(Expr::Integer(1), x()));
  }

  #[test]
  fn integer_ratio_is_reduced() {
    let e = Expr::divide(Expr::times(Expr::Integer(2), x()), Expr::Integer(-4));
    assert_eq!(
      simplify(e),
      Expr::neg(Expr::divide(x(), Expr::Integer(2)))
    );
  }

  #[test]
  fn exact_function_values() {
    assert_eq!(
      simplify(Expr::call(MathFunction::Cos, Expr::Integer(0))),
      Expr::Integer(1)
    );
    assert_eq!(
      simplify(Expr::call(MathFunction::Sqrt, Expr::Integer(1))),
      Expr::Integer(1)
    );
    assert_eq!(
      simplify(Expr::call(MathFunction::Log, Expr::Integer(1))),
      Expr::Integer(0)
    );
  }
}
