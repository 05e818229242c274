//! Real-time compositing
//!
//! - Raster surface with stretch, circular clip and ring drawing
//! - Overlay position controller for the camera circle
//! - Compositor driving the periodic repaint and exposing the composite stream

pub mod overlay;
pub mod renderer;
pub mod surface;

pub use overlay::{ContainerRect, OverlayController, OverlayGeometry, Point, ResizeDirection};
pub use renderer::{Compositor, CompositorOptions};
pub use surface::{PixelRect, RasterSurface};
