// src/painter/texture.rs
//! Texture - the fixed-size canvas operations draw into.
//!
//! A texture keeps both the RGBA pixels and the scene that produced them
//! (background, background rectangle, figure anchors), so operations that
//! change earlier layers (a new background, moving figures, reset) can
//! re-rasterize from the model instead of patching pixels.

use crate::config::{AppearanceConfig, FigureConfig};
use image::{Rgba, RgbaImage};

/// Canvas edge length in pixels. Script coordinates are fractions of this.
pub const CANVAS_SIZE: u32 = 400;

/// Pixel dimensions of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Size { width, height }
    }

    /// The 400x400 canvas every loop allocates.
    pub const fn canvas() -> Self {
        Size::new(CANVAS_SIZE, CANVAS_SIZE)
    }
}

/// A pixel position. May lie outside the canvas; drawing clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }
}

/// Axis-aligned rectangle covering `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub const fn new(min: Point, max: Point) -> Self {
        Rect { min, max }
    }

    /// Returns the same area with `min <= max` on both axes.
    pub fn canonical(self) -> Self {
        Rect {
            min: Point::new(self.min.x.min(self.max.x), self.min.y.min(self.max.y)),
            max: Point::new(self.min.x.max(self.max.x), self.min.y.max(self.max.y)),
        }
    }
}

/// Full-canvas fills available from the command language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    White,
    Green,
}

/// Everything drawn on a texture, in paint order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub background: Option<Background>,
    pub rect: Option<Rect>,
    pub figures: Vec<Point>,
}

/// Identity assigned by the allocating screen. Never copied between textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

pub struct Texture {
    id: TextureId,
    appearance: AppearanceConfig,
    scene: Scene,
    pixels: RgbaImage,
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("size", &self.size())
            .field("scene", &self.scene)
            .finish()
    }
}

impl Texture {
    /// Creates a blank texture.
    pub fn new(id: TextureId, size: Size, appearance: AppearanceConfig) -> Self {
        let blank: Rgba<u8> = appearance.colors.blank.into();
        Texture {
            id,
            appearance,
            scene: Scene::default(),
            pixels: RgbaImage::from_pixel(size.width, size.height, blank),
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn size(&self) -> Size {
        Size::new(self.pixels.width(), self.pixels.height())
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Pixel at `(x, y)`, or `None` outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.pixels.get_pixel_checked(x, y).copied()
    }

    pub fn set_background(&mut self, background: Background) {
        self.scene.background = Some(background);
        self.redraw();
    }

    /// Replaces the background rectangle.
    pub fn set_rect(&mut self, rect: Rect) {
        self.scene.rect = Some(rect.canonical());
        self.redraw();
    }

    pub fn add_figure(&mut self, at: Point) {
        self.scene.figures.push(at);
        // Figures are the top layer, so a new one can be painted in place.
        let color: Rgba<u8> = self.appearance.colors.figure.into();
        let figure = self.appearance.figure;
        for part in figure_parts(at, figure) {
            self.fill(part, color);
        }
    }

    pub fn move_figures(&mut self, dx: i32, dy: i32) {
        for p in &mut self.scene.figures {
            p.x = p.x.saturating_add(dx);
            p.y = p.y.saturating_add(dy);
        }
        self.redraw();
    }

    /// Drops the whole scene and returns to the blank canvas.
    pub fn reset(&mut self) {
        self.scene = Scene::default();
        self.redraw();
    }

    /// Makes this texture show the same frame as `other`, keeping its own id.
    pub fn sync_from(&mut self, other: &Texture) {
        self.scene.clone_from(&other.scene);
        self.pixels.clone_from(&other.pixels);
    }

    fn redraw(&mut self) {
        let colors = &self.appearance.colors;
        let base = match self.scene.background {
            Some(Background::White) => colors.white,
            Some(Background::Green) => colors.green,
            None => colors.blank,
        };
        let base: Rgba<u8> = base.into();
        let rect_color: Rgba<u8> = colors.rectangle.into();
        let figure_color: Rgba<u8> = colors.figure.into();

        for px in self.pixels.pixels_mut() {
            *px = base;
        }
        if let Some(rect) = self.scene.rect {
            self.fill(rect, rect_color);
        }
        let figure = self.appearance.figure;
        for i in 0..self.scene.figures.len() {
            let at = self.scene.figures[i];
            for part in figure_parts(at, figure) {
                self.fill(part, figure_color);
            }
        }
    }

    /// Fills `rect`, clipped to the canvas.
    fn fill(&mut self, rect: Rect, color: Rgba<u8>) {
        let rect = rect.canonical();
        let (w, h) = (self.pixels.width() as i64, self.pixels.height() as i64);
        let x0 = (rect.min.x as i64).clamp(0, w) as u32;
        let x1 = (rect.max.x as i64).clamp(0, w) as u32;
        let y0 = (rect.min.y as i64).clamp(0, h) as u32;
        let y1 = (rect.max.y as i64).clamp(0, h) as u32;
        for y in y0..y1 {
            for x in x0..x1 {
                self.pixels.put_pixel(x, y, color);
            }
        }
    }
}

/// Bar and stem of the "T" centered on `at`.
fn figure_parts(at: Point, figure: FigureConfig) -> [Rect; 2] {
    let (x, y) = (at.x as i64, at.y as i64);
    let total_height = figure.bar_height as i64 + figure.stem_height as i64;
    let top = y - total_height / 2;
    let bar_left = x - figure.bar_width as i64 / 2;
    let stem_left = x - figure.stem_width as i64 / 2;
    let stem_top = top + figure.bar_height as i64;

    [
        rect_i64(
            bar_left,
            top,
            bar_left + figure.bar_width as i64,
            stem_top,
        ),
        rect_i64(
            stem_left,
            stem_top,
            stem_left + figure.stem_width as i64,
            top + total_height,
        ),
    ]
}

fn rect_i64(x0: i64, y0: i64, x1: i64, y1: i64) -> Rect {
    let c = |v: i64| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    Rect::new(Point::new(c(x0), c(y0)), Point::new(c(x1), c(y1)))
}
