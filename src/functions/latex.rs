//! LaTeX rendering of expressions for the math blocks of a presentation.
//!
//! Output follows the conventions of common CAS printers:
//! - `x^{2} + 2 y`
//! - `\sin{\left(x \right)} + \cos{\left(y \right)}`
//! - `\frac{1}{2 \sqrt{x}}`
//! - `e^{x y}` for `exp(x*y)`
//! - `\tan^{2}{\left(x \right)}` for `tan(x)**2`

use std::fmt;

use crate::syntax::{format_real, BinaryOperator, Expr, MathFunction};

/// `Display` adapter producing LaTeX for an expression.
pub struct LatexFormatter<'expr> {
  pub expr: &'expr Expr,
}

impl fmt::Display for LatexFormatter<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    format_latex(self.expr, f)
  }
}

pub fn to_latex(expr: &Expr) -> String {
  LatexFormatter { expr }.to_string()
}

fn latex_name(function: MathFunction) -> &'static str {
  match function {
    MathFunction::Sin => r"\sin",
    MathFunction::Cos => r"\cos",
    MathFunction::Tan => r"\tan",
    MathFunction::Exp => r"\exp",
    MathFunction::Log => r"\log",
    MathFunction::Sqrt => r"\sqrt",
  }
}

/// Binding strength used to decide where parentheses are needed.
fn strength(expr: &Expr) -> u8 {
  match expr {
    Expr::BinaryOp {
      op: BinaryOperator::Plus | BinaryOperator::Minus,
      ..
    } => 1,
    Expr::BinaryOp {
      op: BinaryOperator::Times,
      ..
    } => 2,
    Expr::Neg(_) => 3,
    Expr::Integer(n) if *n < 0 => 3,
    Expr::Real(r) if r.is_sign_negative() => 3,
    // \frac{}{} and powers are already grouped
    _ => 4,
  }
}

/// Sums, and signed terms that would otherwise produce `+ -` or `- -`.
fn needs_group_after_operator(expr: &Expr) -> bool {
  let s = strength(expr);
  s < 2 || s == 3
}

fn write_number(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
  match expr {
    Expr::Integer(n) => write!(f, "{n}"),
    Expr::Real(r) if r.is_infinite() => {
      let sign = if *r < 0.0 { "-" } else { "" };
      write!(f, r"{sign}\infty")
    }
    Expr::Real(r) => f.write_str(&format_real(*r)),
    _ => Ok(()),
  }
}

fn write_grouped(
  f: &mut fmt::Formatter<'_>,
  expr: &Expr,
  parens: bool,
) -> fmt::Result {
  if parens {
    write!(f, r"\left({}\right)", LatexFormatter { expr })
  } else {
    format_latex(expr, f)
  }
}

/// A factor that starts with a digit needs an explicit `\cdot` after
/// another factor, otherwise `2 3` would read as 23.
fn starts_with_digit(expr: &Expr) -> bool {
  match expr {
    Expr::Integer(_) | Expr::Real(_) => true,
    Expr::BinaryOp {
      op: BinaryOperator::Times | BinaryOperator::Power,
      left,
      ..
    } => starts_with_digit(left),
    _ => false,
  }
}

fn format_latex(expr: &Expr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
  match expr {
    Expr::Integer(_) | Expr::Real(_) => write_number(f, expr),
    Expr::Identifier(v) => write!(f, "{v}"),
    Expr::Neg(operand) => {
      f.write_str("- ")?;
      write_grouped(f, operand, needs_group_after_operator(operand))
    }
    Expr::BinaryOp { op, left, right } => match op {
      BinaryOperator::Plus => {
        format_latex(left, f)?;
        match right.as_ref() {
          Expr::Neg(inner) => {
            f.write_str(" - ")?;
            write_grouped(f, inner, needs_group_after_operator(inner))
          }
          Expr::Integer(n) if *n < 0 => write!(f, " - {}", n.unsigned_abs()),
          Expr::Real(r) if r.is_sign_negative() && r.is_finite() => {
            write!(f, " - {}", format_real(-r))
          }
          _ => {
            f.write_str(" + ")?;
            format_latex(right, f)
          }
        }
      }
      BinaryOperator::Minus => {
        format_latex(left, f)?;
        f.write_str(" - ")?;
        write_grouped(f, right, needs_group_after_operator(right))
      }
      BinaryOperator::Times => {
        write_grouped(f, left, strength(left) < 2)?;
        let separator = if starts_with_digit(right) {
          r" \cdot "
        } else {
          " "
        };
        f.write_str(separator)?;
        write_grouped(f, right, needs_group_after_operator(right))
      }
      BinaryOperator::Divide => write!(
        f,
        r"\frac{{{}}}{{{}}}",
        LatexFormatter { expr: left },
        LatexFormatter { expr: right }
      ),
      BinaryOperator::Power => match left.as_ref() {
        // \tan^{2}{\left(x \right)}
        Expr::FunctionCall {
          function:
            function @ (MathFunction::Sin | MathFunction::Cos | MathFunction::Tan),
          arg,
        } => write!(
          f,
          r"{}^{{{}}}{{\left({} \right)}}",
          latex_name(*function),
          LatexFormatter { expr: right },
          LatexFormatter { expr: arg }
        ),
        // \log{\left(x \right)}^{2}
        Expr::FunctionCall {
          function: MathFunction::Log,
          ..
        } => write!(
          f,
          "{}^{{{}}}",
          LatexFormatter { expr: left },
          LatexFormatter { expr: right }
        ),
        _ => {
          let base_parens = matches!(
            left.as_ref(),
            Expr::BinaryOp { .. } | Expr::Neg(_) | Expr::FunctionCall { .. }
          ) || strength(left) < 4;
          write_grouped(f, left, base_parens)?;
          write!(f, "^{{{}}}", LatexFormatter { expr: right })
        }
      },
    },
    Expr::FunctionCall { function, arg } => match function {
      MathFunction::Sqrt => {
        write!(f, r"\sqrt{{{}}}", LatexFormatter { expr: arg })
      }
      MathFunction::Exp => write!(f, "e^{{{}}}", LatexFormatter { expr: arg }),
      _ => write!(
        f,
        r"{}{{\left({} \right)}}",
        latex_name(*function),
        LatexFormatter { expr: arg }
      ),
    },
  }
}
