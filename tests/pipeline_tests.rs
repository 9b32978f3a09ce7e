use multivar_explorer::evaluator::evaluate_grid;
use multivar_explorer::report::{failure, Block, Presentation};
use multivar_explorer::syntax::{Expr, Variable};
use multivar_explorer::topics::{Request, Topic, VariableMode};
use multivar_explorer::{
  evaluate_request, explore, parse_expression, slice, EvaluationError,
  ExplorerError, ParseError,
};

mod pipeline_tests {
  use super::*;

  fn math_blocks(p: &Presentation) -> Vec<&str> {
    p.blocks
      .iter()
      .filter_map(|b| match b {
        Block::Math(s) => Some(s.as_str()),
        _ => None,
      })
      .collect()
  }

  fn info_blocks(p: &Presentation) -> Vec<&str> {
    p.blocks
      .iter()
      .filter_map(|b| match b {
        Block::Info(s) => Some(s.as_str()),
        _ => None,
      })
      .collect()
  }

  mod scenarios {
    use super::*;

    #[test_log::test]
    fn trig_surface_visualization() {
      let request = Request::default();
      let evaluated = evaluate_request(&request).unwrap();
      let (lo, hi) = evaluated.heights.finite_range().unwrap();
      assert!(lo >= -2.0 && hi <= 2.0);
      assert_eq!(evaluated.heights.non_finite_count(), 0);

      let presentation = explore(&request).unwrap();
      assert_eq!(
        presentation.blocks[0],
        Block::Subheader("🔹 Meaning & Visualization".to_string())
      );
      assert!(presentation.chart().unwrap().starts_with("<svg"));
      let info = info_blocks(&presentation);
      assert_eq!(info.len(), 1);
      assert!(info[0].contains("varying curvature"));
    }

    #[test_log::test]
    fn paraboloid_partial_derivatives() {
      let request =
        Request::new("x**2 + y**2").with_topic(Topic::PartialDerivatives);
      let presentation = explore(&request).unwrap();
      assert_eq!(
        math_blocks(&presentation),
        vec![
          r"\frac{\partial f}{\partial x} = 2 x",
          r"\frac{\partial f}{\partial y} = 2 y",
        ]
      );
      assert_eq!(
        info_blocks(&presentation),
        vec!["At (x₀, y₀) = (1, 1): f_x = 2, f_y = 2"]
      );
      assert!(presentation.chart().is_some());
    }

    #[test_log::test]
    fn log_has_holes_left_of_the_y_axis() {
      let evaluated = evaluate_request(&Request::new("log(x)")).unwrap();
      let axis = evaluated.grid.axis();
      for row in evaluated.heights.rows() {
        for (col, v) in row.iter().enumerate() {
          assert_eq!(v.is_nan(), axis[col] <= 0.0);
        }
      }
      // still renders and classifies
      assert!(explore(&Request::new("log(x)")).is_ok());
    }

    #[test_log::test]
    fn reciprocal_on_default_grid() {
      let evaluated = evaluate_request(&Request::new("1/x")).unwrap();
      assert_eq!(evaluated.heights.non_finite_count(), 0);
    }

    #[test_log::test]
    fn unknown_function_stops_before_evaluation() {
      let request = Request::new("foo(x)");
      let err = explore(&request).unwrap_err();
      assert!(matches!(
        err,
        ExplorerError::Parse(ParseError::UnknownFunction(_))
      ));
      assert_eq!(err.headline(), "❌ Invalid function input.");

      let view = failure(&request, &err);
      assert!(view.is_failure());
      assert!(view.chart().is_none());
      let text = view.to_text();
      assert!(text.contains("Use `**` for powers (example: `x**2`)"));
      assert!(text.contains("`x**2 + y**2 + z**2`"));
    }
  }

  mod limits {
    use super::*;

    #[test_log::test]
    fn oversized_input_gets_the_parse_help() {
      let request = Request::new(vec!["x"; 20_000].join("+"));
      let err = explore(&request).unwrap_err();
      assert!(matches!(
        err,
        ExplorerError::Parse(ParseError::TooComplex(_))
      ));
      assert_eq!(err.headline(), "❌ Invalid function input.");
      let text = failure(&request, &err).to_text();
      assert!(text.contains("Allowed variables: x, y, z"));
    }

    #[test_log::test]
    fn largest_accepted_sum_runs_every_topic() {
      let input = vec!["x*y"; 80].join(" + ");
      for topic in Topic::ALL {
        let request = Request::new(input.as_str()).with_topic(topic);
        let presentation = explore(&request).unwrap();
        assert!(!presentation.is_failure());
      }
    }
  }

  mod slicing {
    use super::*;

    #[test]
    fn slicing_equals_substitution() {
      let parsed = parse_expression("x**2 + y**2 + z**2").unwrap();
      assert_eq!(
        slice(&parsed, VariableMode::Three, 2.0),
        parsed.substitute(Variable::Z, &Expr::Real(2.0))
      );
      assert_eq!(slice(&parsed, VariableMode::Two, 2.0), parsed);
    }

    #[test]
    fn sliced_surface_is_evaluated() {
      let request = Request::new("x**2 + y**2 + z**2")
        .with_variables(VariableMode::Three)
        .with_slice(2.0);
      let evaluated = evaluate_request(&request).unwrap();
      let expected = evaluate_grid(
        &parse_expression("x**2 + y**2 + 2.0**2").unwrap(),
        &evaluated.grid,
      )
      .unwrap();
      assert_eq!(evaluated.heights, expected);
      assert!(evaluated.surface.free_variables().iter().all(|v| *v != Variable::Z));
    }

    #[test]
    fn slice_value_is_clamped() {
      let base = Request::new("z*x").with_variables(VariableMode::Three);
      let clamped = evaluate_request(&base.clone().with_slice(9.0)).unwrap();
      let edge = evaluate_request(&base.with_slice(5.0)).unwrap();
      assert_eq!(clamped.heights, edge.heights);
    }

    #[test]
    fn z_in_two_variable_mode_is_an_evaluation_error() {
      let err = explore(&Request::new("x + z")).unwrap_err();
      assert!(matches!(
        err,
        ExplorerError::Evaluation(EvaluationError::UnboundVariable(Variable::Z))
      ));
      assert_eq!(err.headline(), "⚠️ The function cannot be evaluated.");
      let text = failure(&Request::new("x + z"), &err).to_text();
      assert!(text.contains("division by zero"));
    }
  }

  mod topics {
    use super::*;

    #[test]
    fn every_topic_has_subheader_and_chart() {
      for topic in Topic::ALL {
        let presentation =
          explore(&Request::new("exp(x*y)").with_topic(topic)).unwrap();
        assert_eq!(
          presentation.blocks[0],
          Block::Subheader(format!("🔹 {}", topic.label()))
        );
        assert!(presentation.chart().is_some(), "{topic:?}");
        assert!(!presentation.is_failure());
      }
    }

    #[test]
    fn gradient_vector() {
      let presentation =
        explore(&Request::new("x**2 + y**2").with_topic(Topic::Gradient))
          .unwrap();
      assert_eq!(
        math_blocks(&presentation),
        vec![r"\nabla f = \left(2 x, 2 y\right)"]
      );
    }

    #[test]
    fn differentials() {
      let presentation =
        explore(&Request::new("x**2 + y**2").with_topic(Topic::Differentials))
          .unwrap();
      assert_eq!(
        math_blocks(&presentation),
        vec![r"df = f_x dx + f_y dy", r"df = 0.2 x + 0.2 y"]
      );
      let info = info_blocks(&presentation);
      assert_eq!(info.len(), 1);
      assert!(info[0].contains("df ≈ 0.4,"), "{}", info[0]);
      assert!(info[0].contains("Δf = 0.42"), "{}", info[0]);
    }

    #[test]
    fn bowl_and_dome_explanations() {
      let bowl = explore(&Request::new("x**2 + y**2")).unwrap();
      assert!(info_blocks(&bowl)[0].contains("above the xy-plane"));
      let dome = explore(&Request::new("-(x**2 + y**2)")).unwrap();
      assert!(info_blocks(&dome)[0].contains("below the xy-plane"));
    }

    #[test]
    fn derivatives_use_the_sliced_surface() {
      let request = Request::new("x*z + y")
        .with_variables(VariableMode::Three)
        .with_slice(3.0)
        .with_topic(Topic::Gradient);
      let presentation = explore(&request).unwrap();
      assert_eq!(
        math_blocks(&presentation),
        vec![r"\nabla f = \left(3.0, 1\right)"]
      );
    }
  }

  mod output {
    use super::*;

    #[test]
    fn json_document() {
      let presentation = explore(&Request::default()).unwrap();
      let value: serde_json::Value =
        serde_json::from_str(&presentation.to_json().unwrap()).unwrap();
      assert_eq!(value["ok"], serde_json::json!(true));
      assert_eq!(value["expression"], serde_json::json!("sin(x) + cos(y)"));
      assert_eq!(value["blocks"][2]["type"], serde_json::json!("chart"));
    }

    #[test]
    fn html_page() {
      let html = explore(&Request::new("x**2 + y**2").with_topic(Topic::Gradient))
        .unwrap()
        .to_html();
      assert!(html.starts_with("<!DOCTYPE html>"));
      assert!(html.contains("mathjax"));
      assert!(html.contains("<svg"));
      assert!(html.contains(r"\[\nabla f"));
    }

    #[test]
    fn text_output_hides_svg() {
      let text = explore(&Request::default()).unwrap().to_text();
      assert!(!text.contains("<svg"));
      assert!(text.contains("[surface chart,"));
    }
  }
}
