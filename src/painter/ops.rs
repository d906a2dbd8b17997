// src/painter/ops.rs
//! Operations - units of work applied to the loop's live texture.

use crate::painter::texture::{Background, Point, Rect, Texture};

/// A drawing mutation.
///
/// `apply` changes the texture in place and returns `true` when the result
/// must be shown, which makes the loop publish the texture and swap buffers.
/// An operation is applied once; reapplying it is not expected to be a no-op.
pub trait Operation: Send {
    fn apply(&self, texture: &mut Texture) -> bool;
}

impl<F> Operation for F
where
    F: Fn(&mut Texture) -> bool + Send,
{
    fn apply(&self, texture: &mut Texture) -> bool {
        self(texture)
    }
}

/// Operations produced by the command language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOp {
    /// `white` / `green`. Does not publish on its own; a script follows it
    /// with `update` (or a publishing operation) to show the result.
    Fill(Background),
    /// `bgrect x1 y1 x2 y2`.
    BgRect { min: Point, max: Point },
    /// `figure x y`. Does not publish on its own.
    Figure(Point),
    /// `move dx dy`.
    Move { dx: i32, dy: i32 },
    /// `reset`.
    Reset,
    /// `update`. Publishes without touching the texture.
    Update,
}

impl DrawOp {
    /// Whether applying this operation publishes a frame.
    pub fn publishes(&self) -> bool {
        !matches!(self, DrawOp::Fill(_) | DrawOp::Figure(_))
    }
}

impl Operation for DrawOp {
    fn apply(&self, texture: &mut Texture) -> bool {
        match *self {
            DrawOp::Fill(background) => texture.set_background(background),
            DrawOp::BgRect { min, max } => texture.set_rect(Rect::new(min, max)),
            DrawOp::Figure(at) => texture.add_figure(at),
            DrawOp::Move { dx, dy } => texture.move_figures(dx, dy),
            DrawOp::Reset => texture.reset(),
            DrawOp::Update => {}
        }
        self.publishes()
    }
}
