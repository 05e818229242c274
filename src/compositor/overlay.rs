//! Camera overlay position controller
//!
//! Tracks pointer drags and discrete resize steps for the circular camera
//! overlay. Position is stored as percentages of the container so it survives
//! container resizes; the rectangle is re-clamped into the container on every
//! update.

use super::surface::PixelRect;
use serde::{Deserialize, Serialize};

pub const MIN_WIDTH: f64 = 100.0;
pub const MAX_WIDTH: f64 = 400.0;
pub const MIN_HEIGHT: f64 = 75.0;
pub const MAX_HEIGHT: f64 = 300.0;

const GROW_FACTOR: f64 = 1.2;
const SHRINK_FACTOR: f64 = 0.8;

/// A pointer position in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounding box of the preview container in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ContainerRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

impl Default for ContainerRect {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1280.0, 720.0)
    }
}

/// Resize step direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeDirection {
    Increase,
    Decrease,
}

/// Overlay placement: position in container percent, size in container pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayGeometry {
    pub x_percent: f64,
    pub y_percent: f64,
    pub width_px: f64,
    pub height_px: f64,
    pub is_dragging: bool,
}

impl Default for OverlayGeometry {
    fn default() -> Self {
        Self {
            x_percent: 75.0,
            y_percent: 70.0,
            width_px: 200.0,
            height_px: 150.0,
            is_dragging: false,
        }
    }
}

impl OverlayGeometry {
    /// Overlay rectangle in container-relative pixels
    pub fn container_rect(&self, container: &ContainerRect) -> PixelRect {
        PixelRect {
            x: self.x_percent / 100.0 * container.width,
            y: self.y_percent / 100.0 * container.height,
            width: self.width_px,
            height: self.height_px,
        }
    }

    /// Overlay rectangle on a frame of the given size.
    ///
    /// Each axis maps by its own frame/container ratio, so a rectangle inside
    /// the container stays inside the frame whatever the two aspect ratios.
    pub fn frame_rect(&self, frame_width: u32, frame_height: u32, container: &ContainerRect) -> PixelRect {
        let scale = |frame: u32, extent: f64| {
            if extent > 0.0 {
                frame as f64 / extent
            } else {
                1.0
            }
        };
        let sx = scale(frame_width, container.width);
        let sy = scale(frame_height, container.height);
        PixelRect {
            x: self.x_percent / 100.0 * frame_width as f64,
            y: self.y_percent / 100.0 * frame_height as f64,
            width: self.width_px * sx,
            height: self.height_px * sy,
        }
    }

    /// Whether the rectangle lies fully inside the container
    pub fn fits_within(&self, container: &ContainerRect) -> bool {
        const EPS: f64 = 1e-6;
        let rect = self.container_rect(container);
        rect.x >= -EPS
            && rect.y >= -EPS
            && rect.x + rect.width <= container.width + EPS
            && rect.y + rect.height <= container.height + EPS
    }

    /// Whether width and height respect the size bounds
    pub fn size_in_bounds(&self) -> bool {
        (MIN_WIDTH..=MAX_WIDTH).contains(&self.width_px)
            && (MIN_HEIGHT..=MAX_HEIGHT).contains(&self.height_px)
    }
}

/// Drag and resize state machine for the overlay
#[derive(Debug, Clone)]
pub struct OverlayController {
    geometry: OverlayGeometry,
    container: ContainerRect,
    drag_offset: Option<Point>,
}

impl Default for OverlayController {
    fn default() -> Self {
        Self::new(ContainerRect::default())
    }
}

impl OverlayController {
    pub fn new(container: ContainerRect) -> Self {
        let mut controller = Self {
            geometry: OverlayGeometry::default(),
            container,
            drag_offset: None,
        };
        controller.clamp_position();
        controller
    }

    pub fn geometry(&self) -> OverlayGeometry {
        self.geometry
    }

    pub fn container(&self) -> ContainerRect {
        self.container
    }

    /// Update the container bounds (layout change) and re-clamp
    pub fn set_container(&mut self, container: ContainerRect) {
        self.container = container;
        self.clamp_position();
    }

    /// Begin a drag. Ignored unless `enabled` (camera overlay mode with an
    /// active recording). Returns whether the drag started.
    pub fn on_drag_start(&mut self, pointer: Point, enabled: bool) -> bool {
        if !enabled {
            return false;
        }
        let rect = self.geometry.container_rect(&self.container);
        self.drag_offset = Some(Point {
            x: pointer.x - (self.container.left + rect.x),
            y: pointer.y - (self.container.top + rect.y),
        });
        self.geometry.is_dragging = true;
        true
    }

    /// Follow the pointer while dragging
    pub fn on_drag_move(&mut self, pointer: Point) {
        let Some(offset) = self.drag_offset else {
            return;
        };
        if self.container.width <= 0.0 || self.container.height <= 0.0 {
            return;
        }

        let x_px = pointer.x - self.container.left - offset.x;
        let y_px = pointer.y - self.container.top - offset.y;
        self.geometry.x_percent = x_px / self.container.width * 100.0;
        self.geometry.y_percent = y_px / self.container.height * 100.0;
        self.clamp_position();
    }

    pub fn on_drag_end(&mut self) {
        self.drag_offset = None;
        self.geometry.is_dragging = false;
    }

    /// Scale both dimensions by one step, then clamp size and position
    pub fn resize(&mut self, direction: ResizeDirection) {
        let factor = match direction {
            ResizeDirection::Increase => GROW_FACTOR,
            ResizeDirection::Decrease => SHRINK_FACTOR,
        };
        self.geometry.width_px = (self.geometry.width_px * factor).clamp(MIN_WIDTH, MAX_WIDTH);
        self.geometry.height_px = (self.geometry.height_px * factor).clamp(MIN_HEIGHT, MAX_HEIGHT);
        self.clamp_position();
    }

    /// Set a position directly (percent), clamped into the container
    pub fn move_to(&mut self, x_percent: f64, y_percent: f64) {
        self.geometry.x_percent = x_percent;
        self.geometry.y_percent = y_percent;
        self.clamp_position();
    }

    fn clamp_position(&mut self) {
        let (max_x, max_y) = self.max_position();
        let g = &mut self.geometry;
        g.x_percent = clamp_or_zero(g.x_percent, max_x);
        g.y_percent = clamp_or_zero(g.y_percent, max_y);
    }

    /// Largest in-bounds percentages for the current size.
    /// An overlay larger than the container is pinned to the origin.
    fn max_position(&self) -> (f64, f64) {
        let axis = |size: f64, extent: f64| {
            if extent <= 0.0 {
                0.0
            } else {
                (100.0 - size / extent * 100.0).max(0.0)
            }
        };
        (
            axis(self.geometry.width_px, self.container.width),
            axis(self.geometry.height_px, self.container.height),
        )
    }
}

fn clamp_or_zero(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max)
}
