use multivar_explorer::evaluator::{evaluate_grid, EvaluationGrid, HeightField};
use multivar_explorer::functions::plot3d::{render_surface, Camera, SurfaceOptions};
use multivar_explorer::parse_expression;

mod svg_rendering_tests {
  use super::*;

  fn render(input: &str, grid: &EvaluationGrid, options: &SurfaceOptions) -> String {
    let heights = evaluate_grid(&parse_expression(input).unwrap(), grid).unwrap();
    render_surface(grid, &heights, options)
  }

  fn polygon_count(svg: &str) -> usize {
    svg.matches("<polygon").count()
  }

  #[test]
  fn test_svg_document_shape() {
    let svg = render("sin(x) + cos(y)", &EvaluationGrid::default(), &SurfaceOptions::default());
    assert!(svg.starts_with("<svg width=\"480\" height=\"480\""));
    assert!(svg.ends_with("</svg>"));
    assert!(svg.contains("fill=\"white\""));
  }

  #[test]
  fn test_two_triangles_per_cell() {
    let svg = render("x*y", &EvaluationGrid::default(), &SurfaceOptions::default());
    assert_eq!(polygon_count(&svg), 59 * 59 * 2);
  }

  #[test]
  fn test_axis_titles() {
    let svg = render("x", &EvaluationGrid::new(5, -5.0, 5.0), &SurfaceOptions::default());
    for title in [">x</text>", ">y</text>", ">f(x,y)</text>"] {
      assert!(svg.contains(title), "missing {title}");
    }
  }

  #[test]
  fn test_custom_titles_are_escaped() {
    let options = SurfaceOptions {
      axis_titles: ["a<b".to_string(), "y".to_string(), "z".to_string()],
      ..SurfaceOptions::default()
    };
    let svg = render("x", &EvaluationGrid::new(5, -5.0, 5.0), &options);
    assert!(svg.contains("a&lt;b"));
  }

  #[test]
  fn test_undefined_cells_are_gaps() {
    let grid = EvaluationGrid::new(11, -5.0, 5.0);
    // sqrt is NaN for x < 0, i.e. columns 0..5
    let svg = render("sqrt(x)", &grid, &SurfaceOptions::default());
    assert_eq!(polygon_count(&svg), 5 * 10 * 2);
  }

  #[test]
  fn test_all_undefined_renders_empty_box() {
    let grid = EvaluationGrid::new(4, -5.0, 5.0);
    let heights = HeightField::from_rows(vec![vec![f64::NAN; 4]; 4]);
    let svg = render_surface(&grid, &heights, &SurfaceOptions::default());
    assert_eq!(polygon_count(&svg), 0);
    assert!(svg.contains("<line"));
    assert!(svg.contains("no finite values"));
  }

  #[test]
  fn test_flat_surface() {
    let svg = render("2", &EvaluationGrid::new(6, -5.0, 5.0), &SurfaceOptions::default());
    assert_eq!(polygon_count(&svg), 5 * 5 * 2);
  }

  #[test]
  fn test_mesh_toggle() {
    let grid = EvaluationGrid::new(6, -5.0, 5.0);
    let with_mesh = render("x + y", &grid, &SurfaceOptions::default());
    let without = render(
      "x + y",
      &grid,
      &SurfaceOptions {
        show_mesh: false,
        ..SurfaceOptions::default()
      },
    );
    assert!(with_mesh.contains("stroke=\"#00000018\""));
    assert!(!without.contains("stroke=\"#00000018\""));
  }

  #[test]
  fn test_camera_changes_projection() {
    let grid = EvaluationGrid::new(6, -5.0, 5.0);
    let front = render("x**2 - y", &grid, &SurfaceOptions::default());
    let side = render(
      "x**2 - y",
      &grid,
      &SurfaceOptions {
        camera: Camera::from_degrees(30.0, 60.0),
        ..SurfaceOptions::default()
      },
    );
    assert_ne!(front, side);
    assert_eq!(polygon_count(&front), polygon_count(&side));
  }

  #[test]
  fn test_rendering_is_deterministic() {
    let grid = EvaluationGrid::default();
    let a = render("exp(-(x**2 + y**2)/4)", &grid, &SurfaceOptions::default());
    let b = render("exp(-(x**2 + y**2)/4)", &grid, &SurfaceOptions::default());
    assert_eq!(a, b);
  }
}
