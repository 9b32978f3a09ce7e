//! SVG rendering of a height field as a shaded 3D surface.
//!
//! The surface is split into two triangles per grid cell, flat-shaded,
//! depth-sorted back to front and projected orthographically. Cells touching
//! an undefined sample are skipped, so NaN and infinite values show up as
//! holes instead of failing the render.

use log::debug;

use crate::evaluator::{EvaluationGrid, HeightField};
use crate::functions::plot::{format_tick, nice_step, svg_escape};

pub const DEFAULT_SIZE: u32 = 480;
/// Height of the box relative to its unit half-width.
const Z_SCALE: f64 = 0.6;
const MAX_TICKS: usize = 12;

/// Viridis color scale stops.
const VIRIDIS: [(f64, (u8, u8, u8)); 9] = [
  (0.0, (68, 1, 84)),
  (0.125, (72, 40, 120)),
  (0.25, (62, 73, 137)),
  (0.375, (49, 104, 142)),
  (0.5, (38, 130, 142)),
  (0.625, (31, 158, 137)),
  (0.75, (53, 183, 121)),
  (0.875, (110, 206, 88)),
  (1.0, (253, 231, 37)),
];

// --- 3D math types and helpers ---

#[derive(Clone, Copy, Debug)]
struct Point3D {
  x: f64,
  y: f64,
  z: f64,
}

/// Viewing direction in spherical coordinates, radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
  pub azimuth: f64,
  pub elevation: f64,
}

impl Default for Camera {
  fn default() -> Self {
    Camera {
      azimuth: -1.07,  // ~-61 degrees
      elevation: 0.63, // ~36 degrees
    }
  }
}

impl Camera {
  pub fn from_degrees(azimuth: f64, elevation: f64) -> Self {
    Camera {
      azimuth: azimuth.to_radians(),
      elevation: elevation.to_radians(),
    }
  }
}

#[derive(Clone, Debug)]
pub struct SurfaceOptions {
  pub width: u32,
  pub height: u32,
  /// Titles for the x, y and z axes.
  pub axis_titles: [String; 3],
  pub show_mesh: bool,
  pub camera: Camera,
}

impl Default for SurfaceOptions {
  fn default() -> Self {
    Self {
      width: DEFAULT_SIZE,
      height: DEFAULT_SIZE,
      axis_titles: ["x".to_string(), "y".to_string(), "f(x,y)".to_string()],
      show_mesh: true,
      camera: Camera::default(),
    }
  }
}

struct Triangle {
  projected: [(f64, f64); 3],
  depth: f64,
  color: (u8, u8, u8),
}

/// Orthographic projection from a camera at spherical (azimuth, elevation).
fn project(p: Point3D, cam: &Camera) -> (f64, f64) {
  let (sa, ca) = cam.azimuth.sin_cos();
  let (se, ce) = cam.elevation.sin_cos();

  // Right vector: (-sin(a), cos(a), 0)
  let screen_x = -p.x * sa + p.y * ca;
  // Up vector: (-cos(a)*sin(e), -sin(a)*sin(e), cos(e))
  let screen_y = -p.x * ca * se - p.y * sa * se + p.z * ce;

  (screen_x, screen_y)
}

/// Depth along the camera direction. Positive = further from viewer.
fn depth(p: Point3D, cam: &Camera) -> f64 {
  let (sa, ca) = cam.azimuth.sin_cos();
  let (se, ce) = cam.elevation.sin_cos();
  -(p.x * ce * ca + p.y * ce * sa + p.z * se)
}

fn triangle_normal(v0: Point3D, v1: Point3D, v2: Point3D) -> [f64; 3] {
  let (ux, uy, uz) = (v1.x - v0.x, v1.y - v0.y, v1.z - v0.z);
  let (vx, vy, vz) = (v2.x - v0.x, v2.y - v0.y, v2.z - v0.z);
  let nx = uy * vz - uz * vy;
  let ny = uz * vx - ux * vz;
  let nz = ux * vy - uy * vx;
  let len = (nx * nx + ny * ny + nz * nz).sqrt();
  if len < 1e-15 {
    [0.0, 0.0, 1.0]
  } else {
    [nx / len, ny / len, nz / len]
  }
}

/// Color for a height normalized to [0, 1].
pub fn viridis(t: f64) -> (u8, u8, u8) {
  let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
  let upper = VIRIDIS
    .iter()
    .position(|(stop, _)| *stop >= t)
    .unwrap_or(VIRIDIS.len() - 1)
    .max(1);
  let (t0, c0) = VIRIDIS[upper - 1];
  let (t1, c1) = VIRIDIS[upper];
  let s = (t - t0) / (t1 - t0);
  let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * s).round() as u8;
  (lerp(c0.0, c1.0), lerp(c0.1, c1.1), lerp(c0.2, c1.2))
}

/// Diffuse + ambient lighting
fn apply_lighting(color: (u8, u8, u8), normal: [f64; 3]) -> (u8, u8, u8) {
  // Light direction: upper-left-front
  let (lx, ly, lz) = (0.4_f64, -0.5_f64, 0.76_f64);
  let len = (lx * lx + ly * ly + lz * lz).sqrt();
  let light = [lx / len, ly / len, lz / len];

  let dot = normal[0] * light[0] + normal[1] * light[1] + normal[2] * light[2];
  let diffuse = dot.abs(); // both sides lit

  let ambient = 0.45;
  let intensity = (ambient + (1.0 - ambient) * diffuse).clamp(0.0, 1.0);

  let scale = |c: u8| (c as f64 * intensity).round() as u8;
  (scale(color.0), scale(color.1), scale(color.2))
}

/// Maps grid indices and heights into the normalized [-1, 1]^2 x
/// [-Z_SCALE, Z_SCALE] box.
struct Normalizer {
  last_index: f64,
  z_lo: f64,
  z_range: f64,
}

impl Normalizer {
  fn point(&self, row: usize, col: usize, z: f64) -> Point3D {
    Point3D {
      x: col as f64 / self.last_index * 2.0 - 1.0,
      y: row as f64 / self.last_index * 2.0 - 1.0,
      z: self.height(z) * 2.0 * Z_SCALE - Z_SCALE,
    }
  }

  /// Height in [0, 1].
  fn height(&self, z: f64) -> f64 {
    (z - self.z_lo) / self.z_range
  }
}

fn build_triangle(
  corners: [(usize, usize, f64); 3],
  norm: &Normalizer,
  camera: &Camera,
) -> Option<Triangle> {
  if corners.iter().any(|(_, _, z)| !z.is_finite()) {
    return None;
  }
  let [v0, v1, v2] = corners.map(|(row, col, z)| norm.point(row, col, z));
  let avg = corners.iter().map(|(_, _, z)| norm.height(*z)).sum::<f64>() / 3.0;
  let color = apply_lighting(viridis(avg), triangle_normal(v0, v1, v2));
  let center = Point3D {
    x: (v0.x + v1.x + v2.x) / 3.0,
    y: (v0.y + v1.y + v2.y) / 3.0,
    z: (v0.z + v1.z + v2.z) / 3.0,
  };
  Some(Triangle {
    projected: [project(v0, camera), project(v1, camera), project(v2, camera)],
    depth: depth(center, camera),
    color,
  })
}

/// Render `heights` sampled on `grid` as an SVG document.
pub fn render_surface(
  grid: &EvaluationGrid,
  heights: &HeightField,
  options: &SurfaceOptions,
) -> String {
  let n = grid.samples();
  let camera = options.camera;
  let finite = heights.finite_range();
  let (z_lo, z_hi) = match finite {
    Some((lo, hi)) if hi - lo <= 1e-12 * lo.abs().max(1.0) => {
      let pad = 0.5 * lo.abs().max(1.0);
      (lo - pad, hi + pad)
    }
    Some(range) => range,
    None => (-1.0, 1.0),
  };
  let norm = Normalizer {
    last_index: n.saturating_sub(1).max(1) as f64,
    z_lo,
    z_range: z_hi - z_lo,
  };
  let z_at = |row: usize, col: usize| heights.get(row, col).unwrap_or(f64::NAN);

  let mut triangles: Vec<Triangle> = Vec::new();
  for row in 0..n.saturating_sub(1) {
    for col in 0..n - 1 {
      let z00 = z_at(row, col);
      let z01 = z_at(row, col + 1);
      let z10 = z_at(row + 1, col);
      let z11 = z_at(row + 1, col + 1);
      triangles.extend(build_triangle(
        [(row, col, z00), (row, col + 1, z01), (row + 1, col, z10)],
        &norm,
        &camera,
      ));
      triangles.extend(build_triangle(
        [(row + 1, col + 1, z11), (row + 1, col, z10), (row, col + 1, z01)],
        &norm,
        &camera,
      ));
    }
  }
  debug!(
    "surface: {} triangles, z range [{z_lo}, {z_hi}]",
    triangles.len()
  );

  // Painter's algorithm: sort back-to-front (largest depth first)
  triangles.sort_by(|a, b| b.depth.total_cmp(&a.depth));

  generate_svg(
    &triangles,
    options,
    grid.range(),
    (z_lo, z_hi),
    finite.is_none(),
  )
}

fn generate_svg(
  triangles: &[Triangle],
  options: &SurfaceOptions,
  xy_range: (f64, f64),
  z_range: (f64, f64),
  undefined: bool,
) -> String {
  let camera = &options.camera;
  let (svg_width, svg_height) = (options.width, options.height);

  // Bounding box of the axis box; the surface always lies inside it
  let mut px_min = f64::INFINITY;
  let mut px_max = f64::NEG_INFINITY;
  let mut py_min = f64::INFINITY;
  let mut py_max = f64::NEG_INFINITY;
  for corner in bounding_box_corners() {
    let (px, py) = project(corner, camera);
    px_min = px_min.min(px);
    px_max = px_max.max(px);
    py_min = py_min.min(py);
    py_max = py_max.max(py);
  }

  let margin = 60.0;
  let draw_w = (svg_width as f64 - 2.0 * margin).max(1.0);
  let draw_h = (svg_height as f64 - 2.0 * margin).max(1.0);
  let p_width = (px_max - px_min).max(1e-9);
  let p_height = (py_max - py_min).max(1e-9);
  let scale = (draw_w / p_width).min(draw_h / p_height);
  let cx = margin + draw_w / 2.0;
  let cy = margin + draw_h / 2.0;
  let p_cx = (px_min + px_max) / 2.0;
  let p_cy = (py_min + py_max) / 2.0;

  let to_svg = |px: f64, py: f64| -> (f64, f64) {
    (cx + (px - p_cx) * scale, cy - (py - p_cy) * scale)
  };

  let mut svg = String::with_capacity(triangles.len() * 120 + 2000);
  svg.push_str(&format!(
    "<svg width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
    w = svg_width,
    h = svg_height
  ));
  svg.push_str(&format!(
    "<rect width=\"{svg_width}\" height=\"{svg_height}\" fill=\"white\"/>\n"
  ));

  let mesh_attrs = if options.show_mesh {
    " stroke=\"#00000018\" stroke-width=\"0.5\""
  } else {
    " stroke=\"none\""
  };

  for tri in triangles {
    let (x0, y0) = to_svg(tri.projected[0].0, tri.projected[0].1);
    let (x1, y1) = to_svg(tri.projected[1].0, tri.projected[1].1);
    let (x2, y2) = to_svg(tri.projected[2].0, tri.projected[2].1);
    let (r, g, b) = tri.color;
    svg.push_str(&format!(
      "<polygon points=\"{x0:.1},{y0:.1} {x1:.1},{y1:.1} {x2:.1},{y2:.1}\" fill=\"rgb({r},{g},{b})\"{mesh_attrs}/>\n"
    ));
  }

  draw_axes(
    &mut svg,
    camera,
    &to_svg,
    [xy_range, xy_range, z_range],
    &options.axis_titles,
  );

  if undefined {
    svg.push_str(&format!(
      "<text x=\"{cx:.1}\" y=\"{cy:.1}\" font-size=\"12\" fill=\"#aa0000\" text-anchor=\"middle\">no finite values on this domain</text>\n"
    ));
  }

  svg.push_str("</svg>");
  svg
}

/// The 8 corners of the normalized bounding box
fn bounding_box_corners() -> [Point3D; 8] {
  let mut corners = [Point3D {
    x: 0.0,
    y: 0.0,
    z: 0.0,
  }; 8];
  for (idx, corner) in corners.iter_mut().enumerate() {
    corner.x = if idx & 1 == 0 { -1.0 } else { 1.0 };
    corner.y = if idx & 2 == 0 { -1.0 } else { 1.0 };
    corner.z = if idx & 4 == 0 { -Z_SCALE } else { Z_SCALE };
  }
  corners
}

/// Draw 3D axis lines with ticks, tick labels and axis titles
fn draw_axes(
  svg: &mut String,
  camera: &Camera,
  to_svg: &dyn Fn(f64, f64) -> (f64, f64),
  ranges: [(f64, f64); 3],
  titles: &[String; 3],
) {
  let axis_color = "#666666";
  let font_size = 10;
  let screen = |p: Point3D| {
    let (px, py) = project(p, camera);
    to_svg(px, py)
  };

  // Bottom corner closest to the viewer
  let origin = bounding_box_corners()
    .into_iter()
    .filter(|c| c.z < -Z_SCALE + 0.01)
    .min_by(|a, b| depth(*a, camera).total_cmp(&depth(*b, camera)))
    .unwrap_or(Point3D {
      x: -1.0,
      y: -1.0,
      z: -Z_SCALE,
    });

  // Each axis: endpoint, and whether it runs from +1 to -1 in normalized
  // space (then the origin stands for the range maximum).
  let axes = [
    (
      Point3D {
        x: -origin.x,
        ..origin
      },
      origin.x > 0.0,
    ),
    (
      Point3D {
        y: -origin.y,
        ..origin
      },
      origin.y > 0.0,
    ),
    (
      Point3D {
        z: Z_SCALE,
        ..origin
      },
      false,
    ),
  ];

  for (((end, flipped), (val_min, val_max)), title) in
    axes.into_iter().zip(ranges).zip(titles)
  {
    let (sx0, sy0) = screen(origin);
    let (sx1, sy1) = screen(end);

    svg.push_str(&format!(
      "<line x1=\"{sx0:.1}\" y1=\"{sy0:.1}\" x2=\"{sx1:.1}\" y2=\"{sy1:.1}\" stroke=\"{axis_color}\" stroke-width=\"1\"/>\n"
    ));

    let dx = sx1 - sx0;
    let dy = sy1 - sy0;
    let len = (dx * dx + dy * dy).sqrt();
    if len <= 1.0 {
      continue;
    }
    // Perpendicular pointing away from the drawing center
    let (mut perpx, mut perpy) = (-dy / len * 4.0, dx / len * 4.0);
    let (mx, my) = ((sx0 + sx1) / 2.0, (sy0 + sy1) / 2.0);
    let (bx, by) = screen(Point3D {
      x: 0.0,
      y: 0.0,
      z: 0.0,
    });
    if (mx + perpx - bx).powi(2) + (my + perpy - by).powi(2)
      < (mx - bx).powi(2) + (my - by).powi(2)
    {
      perpx = -perpx;
      perpy = -perpy;
    }

    let step = nice_step(val_max - val_min, 4);
    if step > 0.0 {
      let first = (val_min / step).ceil();
      for k in 0..MAX_TICKS {
        let tick_val = (first + k as f64) * step;
        if tick_val > val_max + step * 0.01 {
          break;
        }
        let t_raw = ((tick_val - val_min) / (val_max - val_min)).clamp(0.0, 1.0);
        let t = if flipped { 1.0 - t_raw } else { t_raw };
        let (tx, ty) = screen(Point3D {
          x: origin.x + (end.x - origin.x) * t,
          y: origin.y + (end.y - origin.y) * t,
          z: origin.z + (end.z - origin.z) * t,
        });

        svg.push_str(&format!(
          "<line x1=\"{tx:.1}\" y1=\"{ty:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{axis_color}\" stroke-width=\"0.5\"/>\n",
          tx + perpx,
          ty + perpy
        ));
        svg.push_str(&format!(
          "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"{font_size}\" fill=\"{axis_color}\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>\n",
          tx + perpx * 3.0,
          ty + perpy * 3.0,
          format_tick(tick_val)
        ));
      }
    }

    svg.push_str(&format!(
      "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"{}\" fill=\"#333333\" text-anchor=\"middle\" dominant-baseline=\"middle\" font-style=\"italic\">{}</text>\n",
      mx + perpx * 7.0,
      my + perpy * 7.0,
      font_size + 2,
      svg_escape(title)
    ));
  }
}
