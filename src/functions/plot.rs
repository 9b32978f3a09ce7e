//! Helpers shared by the chart renderers: tick spacing and label text.

/// A "nice" tick step (1, 2 or 5 times a power of ten) that splits `range`
/// into roughly `target_labels` intervals.
pub(crate) fn nice_step(range: f64, target_labels: usize) -> f64 {
  if !range.is_finite() || range <= 0.0 || target_labels == 0 {
    return 0.0;
  }
  let raw = range / target_labels as f64;
  let mag = 10_f64.powf(raw.abs().log10().floor());
  let norm = raw / mag;
  let nice = if norm <= 1.0 {
    1.0
  } else if norm <= 2.0 {
    2.0
  } else if norm <= 5.0 {
    5.0
  } else {
    10.0
  };
  nice * mag
}

/// Format a tick value, dropping the trailing ".0" for integers.
pub(crate) fn format_tick(v: f64) -> String {
  if (v - v.round()).abs() < 1e-9 {
    format!("{}", v.round() as i64)
  } else if v.abs() < 0.1 {
    format!("{v:.2}")
  } else {
    format!("{v:.1}")
  }
}

pub(crate) fn svg_escape(s: &str) -> String {
  s.replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}
