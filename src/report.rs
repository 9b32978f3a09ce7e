//! Presentation model shared by every topic, and its text, JSON and HTML
//! renderings.

use serde_json::{json, Value};

use crate::functions::plot::svg_escape;
use crate::topics::Request;
use crate::{
  ExplorerError, EVALUATION_HELP, PARSE_HELP_EXAMPLES, PARSE_HELP_RULES,
};

pub const TITLE: &str = "📊 Interactive Multivariable Functions Explorer";
pub const INTRO: &str = "This app helps you explore functions of several \
  variables using interactive graphs. You can rotate, zoom, and analyze how \
  the surface behaves.";

/// One element of a presentation, in display order.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
  Subheader(String),
  /// Markdown-flavored prose.
  Text(String),
  /// A LaTeX formula rendered in display mode.
  Math(String),
  Info(String),
  Chart { svg: String },
  Error(String),
}

impl Block {
  fn kind(&self) -> &'static str {
    match self {
      Block::Subheader(_) => "subheader",
      Block::Text(_) => "text",
      Block::Math(_) => "math",
      Block::Info(_) => "info",
      Block::Chart { .. } => "chart",
      Block::Error(_) => "error",
    }
  }

  fn content(&self) -> &str {
    match self {
      Block::Subheader(s)
      | Block::Text(s)
      | Block::Math(s)
      | Block::Info(s)
      | Block::Error(s) => s,
      Block::Chart { svg } => svg,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
  pub title: String,
  pub intro: String,
  /// The function text as entered.
  pub expression: String,
  pub blocks: Vec<Block>,
}

impl Presentation {
  pub fn new(expression: &str, blocks: Vec<Block>) -> Self {
    Self {
      title: TITLE.to_string(),
      intro: INTRO.to_string(),
      expression: expression.to_string(),
      blocks,
    }
  }

  pub fn is_failure(&self) -> bool {
    self.blocks.iter().any(|b| matches!(b, Block::Error(_)))
  }

  pub fn chart(&self) -> Option<&str> {
    self.blocks.iter().find_map(|b| match b {
      Block::Chart { svg } => Some(svg.as_str()),
      _ => None,
    })
  }

  /// Terminal rendering. Charts are replaced by a placeholder line since
  /// SVG is not readable as text.
  pub fn to_text(&self) -> String {
    let mut out = format!("{}\n{}\n\nf = {}\n", self.title, self.intro, self.expression);
    for block in &self.blocks {
      out.push('\n');
      match block {
        Block::Subheader(s) => {
          out.push_str(s);
          out.push('\n');
          out.push_str(&"-".repeat(s.chars().count()));
        }
        Block::Text(s) => out.push_str(s),
        Block::Math(s) => {
          out.push_str("    ");
          out.push_str(s);
        }
        Block::Info(s) => {
          out.push_str("ℹ ");
          out.push_str(s);
        }
        Block::Chart { svg } => {
          out.push_str(&format!("[surface chart, {} bytes of SVG]", svg.len()))
        }
        Block::Error(s) => out.push_str(s),
      }
      out.push('\n');
    }
    out
  }

  pub fn to_json_value(&self) -> Value {
    let blocks: Vec<Value> = self
      .blocks
      .iter()
      .map(|b| json!({ "type": b.kind(), "content": b.content() }))
      .collect();
    json!({
      "title": self.title,
      "intro": self.intro,
      "expression": self.expression,
      "ok": !self.is_failure(),
      "blocks": blocks,
    })
  }

  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&self.to_json_value())
  }

  /// Standalone HTML page; formulas are typeset by MathJax.
  pub fn to_html(&self) -> String {
    let mut body = String::new();
    for block in &self.blocks {
      let html = match block {
        Block::Subheader(s) => format!("<h2>{}</h2>", svg_escape(s)),
        Block::Text(s) => format!("<p>{}</p>", markdown_inline(s)),
        Block::Math(s) => format!("<div class=\"math\">\\[{}\\]</div>", svg_escape(s)),
        Block::Info(s) => format!("<div class=\"info\">{}</div>", markdown_inline(s)),
        Block::Chart { svg } => format!("<figure>{svg}</figure>"),
        Block::Error(s) => format!("<div class=\"error\">{}</div>", markdown_inline(s)),
      };
      body.push_str("    ");
      body.push_str(&html);
      body.push('\n');
    }

    format!(
      r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>{title}</title>
    <script src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-chtml.js" async></script>
    <style>
      body {{ font-family: sans-serif; max-width: 50em; margin: 2em auto; }}
      .info {{ background: #e8f1fb; padding: 0.8em; border-radius: 4px; }}
      .error {{ background: #fdecea; padding: 0.8em; border-radius: 4px; white-space: pre-line; }}
      p {{ white-space: pre-line; }}
      code {{ background: #f3f3f3; padding: 0 0.2em; }}
    </style>
  </head>
  <body>
    <h1>{title}</h1>
    <p>{intro}</p>
    <p>f = <code>{expression}</code></p>
{body}  </body>
</html>
"#,
      title = svg_escape(&self.title),
      intro = svg_escape(&self.intro),
      expression = svg_escape(&self.expression),
    )
  }
}

/// Escape `s` and turn `**bold**` and `` `code` `` spans into HTML.
fn markdown_inline(s: &str) -> String {
  let escaped = svg_escape(s);
  let mut out = String::with_capacity(escaped.len());
  let mut bold = false;
  let mut code = false;
  let mut rest = escaped.as_str();
  while let Some(c) = rest.chars().next() {
    if !code && rest.starts_with("**") {
      out.push_str(if bold { "</strong>" } else { "<strong>" });
      bold = !bold;
      rest = &rest[2..];
      continue;
    }
    if c == '`' {
      out.push_str(if code { "</code>" } else { "<code>" });
      code = !code;
    } else {
      out.push(c);
    }
    rest = &rest[c.len_utf8()..];
  }
  out
}

/// The view shown when the pipeline stops early: the error headline and
/// what the user can do about it.
pub fn failure(request: &Request, error: &ExplorerError) -> Presentation {
  let mut blocks = vec![Block::Error(format!("{}\n\n{error}", error.headline()))];
  match error {
    ExplorerError::Parse(_) => {
      let rules: Vec<String> =
        PARSE_HELP_RULES.iter().map(|r| format!("- {r}")).collect();
      blocks.push(Block::Text(format!(
        "**Please check the syntax:**\n{}",
        rules.join("\n")
      )));
      let examples: Vec<String> = PARSE_HELP_EXAMPLES
        .iter()
        .map(|e| format!("- `{e}`"))
        .collect();
      blocks.push(Block::Text(format!(
        "**Examples:**\n{}",
        examples.join("\n")
      )));
    }
    ExplorerError::Evaluation(_) => {
      blocks.push(Block::Text(EVALUATION_HELP.to_string()))
    }
  }
  Presentation::new(&request.expression, blocks)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn inline_markdown() {
    assert_eq!(
      markdown_inline("the **surface** `x**2` <"),
      "the <strong>surface</strong> <code>x**2</code> &lt;"
    );
  }

  #[test]
  fn json_marks_failures() {
    let p = Presentation::new("x", vec![Block::Error("bad".into())]);
    assert_eq!(p.to_json_value()["ok"], json!(false));
    assert_eq!(p.to_json_value()["blocks"][0]["type"], json!("error"));
  }
}
