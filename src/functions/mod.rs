// Functions are organized by categories
pub mod calculus;
pub mod latex;
pub mod plot;
pub mod plot3d;
pub mod surface;

// Re-export the stage entry points
pub use calculus::{differential, differentiate, gradient, Gradient};
pub use latex::to_latex;
pub use plot3d::{render_surface, Camera, SurfaceOptions};
pub use surface::{classify, explain_surface, SurfaceShape};
