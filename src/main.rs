use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, error, info};

use multivar_explorer::functions::calculus::differentiate;
use multivar_explorer::functions::latex::to_latex;
use multivar_explorer::functions::plot3d::{Camera, SurfaceOptions, DEFAULT_SIZE};
use multivar_explorer::report::{failure, Presentation};
use multivar_explorer::syntax::Variable;
use multivar_explorer::topics::{Request, Topic, VariableMode};
use multivar_explorer::{explore, parse_expression, ExplorerError};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Log more (-v info, -vv debug). RUST_LOG takes precedence
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Evaluate a function on the grid and present one topic
  Explore(ExploreArgs),
  /// Print the partial derivative of a function
  Diff {
    /// The function, e.g. "x**2 + y**2"
    expression: String,
    /// Variable to differentiate with respect to
    #[arg(long, default_value = "x", value_parser = parse_variable)]
    var: Variable,
    /// Print LaTeX instead of plain text
    #[arg(long)]
    latex: bool,
  },
}

#[derive(Args)]
struct ExploreArgs {
  /// The function; defaults to the example for the selected variable count
  expression: Option<String>,
  #[arg(long, value_enum, default_value_t = VariableMode::Two)]
  variables: VariableMode,
  #[arg(long, value_enum, default_value_t = Topic::Visualization)]
  topic: Topic,
  /// Fixed z value in three-variable mode, in [-5, 5]
  #[arg(long = "slice", default_value_t = 0.0, allow_negative_numbers = true)]
  slice: f64,
  #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
  x0: f64,
  #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
  y0: f64,
  #[arg(long, default_value_t = 0.1, allow_negative_numbers = true)]
  dx: f64,
  #[arg(long, default_value_t = 0.1, allow_negative_numbers = true)]
  dy: f64,
  #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
  format: OutputFormat,
  /// Write to a file instead of stdout
  #[arg(short, long)]
  output: Option<PathBuf>,
  /// Chart width in pixels
  #[arg(long, default_value_t = DEFAULT_SIZE)]
  width: u32,
  /// Chart height in pixels
  #[arg(long, default_value_t = DEFAULT_SIZE)]
  height: u32,
  /// Camera azimuth in degrees
  #[arg(long, allow_negative_numbers = true)]
  azimuth: Option<f64>,
  /// Camera elevation in degrees
  #[arg(long, allow_negative_numbers = true)]
  elevation: Option<f64>,
  /// Hide the mesh lines on the surface
  #[arg(long)]
  no_mesh: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
  Text,
  Json,
  Html,
}

fn parse_variable(s: &str) -> Result<Variable, String> {
  Variable::from_name(s).ok_or_else(|| format!("expected x, y or z, got `{s}`"))
}

impl ExploreArgs {
  fn request(&self) -> Request {
    let default_camera = Camera::default();
    let camera = match (self.azimuth, self.elevation) {
      (None, None) => default_camera,
      (azimuth, elevation) => Camera::from_degrees(
        azimuth.unwrap_or(default_camera.azimuth.to_degrees()),
        elevation.unwrap_or(default_camera.elevation.to_degrees()),
      ),
    };

    Request {
      expression: self
        .expression
        .clone()
        .unwrap_or_else(|| self.variables.default_expression().to_string()),
      variables: self.variables,
      topic: self.topic,
      slice_value: self.slice,
      x0: self.x0,
      y0: self.y0,
      dx: self.dx,
      dy: self.dy,
      surface: SurfaceOptions {
        width: self.width,
        height: self.height,
        show_mesh: !self.no_mesh,
        camera,
        ..SurfaceOptions::default()
      },
    }
  }
}

fn render(presentation: &Presentation, format: OutputFormat) -> Result<String> {
  Ok(match format {
    OutputFormat::Text => presentation.to_text(),
    OutputFormat::Json => presentation
      .to_json()
      .context("failed to serialize the presentation")?,
    OutputFormat::Html => presentation.to_html(),
  })
}

fn write_output(text: &str, output: Option<&PathBuf>) -> Result<()> {
  match output {
    Some(path) => {
      fs::write(path, text)
        .with_context(|| format!("failed to write {}", path.display()))?;
      info!("wrote {}", path.display());
    }
    None => print!("{text}"),
  }
  Ok(())
}

fn run_explore(args: &ExploreArgs) -> Result<ExitCode> {
  let request = args.request();
  debug!("request: {request:?}");

  let (presentation, status) = match explore(&request) {
    Ok(presentation) => (presentation, ExitCode::SUCCESS),
    Err(err) => {
      error!("{err}");
      (failure(&request, &err), ExitCode::from(1))
    }
  };
  write_output(&render(&presentation, args.format)?, args.output.as_ref())?;
  Ok(status)
}

fn run_diff(expression: &str, var: Variable, latex: bool) -> Result<ExitCode> {
  match parse_expression(expression) {
    Ok(expr) => {
      let derivative = differentiate(&expr, var);
      if latex {
        println!("{}", to_latex(&derivative));
      } else {
        println!("{derivative}");
      }
      Ok(ExitCode::SUCCESS)
    }
    Err(err) => {
      let err = ExplorerError::from(err);
      let request = Request::new(expression);
      eprint!("{}", failure(&request, &err).to_text());
      Ok(ExitCode::from(1))
    }
  }
}

fn init_logging(verbose: u8) {
  let default_filter = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  env_logger::Builder::from_env(
    env_logger::Env::default().default_filter_or(default_filter),
  )
  .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let result = match &cli.command {
    Commands::Explore(args) => run_explore(args),
    Commands::Diff {
      expression,
      var,
      latex,
    } => run_diff(expression, *var, *latex),
  };

  match result {
    Ok(status) => status,
    Err(e) => {
      eprintln!("Error: {e:#}");
      ExitCode::from(1)
    }
  }
}
