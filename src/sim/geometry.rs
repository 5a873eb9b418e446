//! Axis-aligned geometry and the ground contour
//!
//! Every collision check in the simulation goes through [`intersects`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (top-left corner + size, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_pos_size(pos: Vec2, size: Vec2) -> Self {
        Self::new(pos.x, pos.y, size.x, size.y)
    }

    /// Rectangle of the given size centered on `center`
    pub fn from_center(center: Vec2, size: Vec2) -> Self {
        Self::new(center.x - size.x / 2.0, center.y - size.y / 2.0, size.x, size.y)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Squared distance between centers (used for closest-first ordering)
    #[inline]
    pub fn distance_sq_to(&self, other: &Rect) -> f32 {
        self.center().distance_squared(other.center())
    }
}

/// AABB overlap test. Rectangles that only share an edge do not overlap.
#[inline]
pub fn intersects(a: Rect, b: Rect) -> bool {
    a.x < b.x + b.w && a.x + a.w > b.x && a.y < b.y + b.h && a.y + a.h > b.y
}

/// Piecewise-linear ground contour
///
/// Nodes are `(x, y)` pairs sorted by x. Heights between nodes are linearly
/// interpolated; beyond either end the nearest node's height is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundProfile {
    nodes: Vec<Vec2>,
}

impl GroundProfile {
    /// Build a profile from sorted nodes. Returns `None` for fewer than two
    /// nodes or x values that are not strictly increasing.
    pub fn new(nodes: Vec<Vec2>) -> Option<Self> {
        if nodes.len() < 2 || nodes.windows(2).any(|w| w[1].x <= w[0].x) {
            return None;
        }
        Some(Self { nodes })
    }

    /// Flat ground at height `y` spanning `[0, width]`
    pub fn flat(y: f32, width: f32) -> Self {
        Self {
            nodes: vec![Vec2::new(0.0, y), Vec2::new(width.max(1.0), y)],
        }
    }

    pub fn nodes(&self) -> &[Vec2] {
        &self.nodes
    }

    /// Ground y at horizontal position `x`
    pub fn height_at(&self, x: f32) -> f32 {
        let first = self.nodes[0];
        let last = self.nodes[self.nodes.len() - 1];
        if x <= first.x {
            return first.y;
        }
        if x >= last.x {
            return last.y;
        }
        // Nodes are few (a dozen at most), a linear scan is fine
        for w in self.nodes.windows(2) {
            let (a, b) = (w[0], w[1]);
            if x <= b.x {
                let t = (x - a.x) / (b.x - a.x);
                return a.y + (b.y - a.y) * t;
            }
        }
        last.y
    }

    /// Snap a falling body onto the contour.
    ///
    /// Returns true when the body's feet reached the ground this step; the
    /// position is clamped so the feet sit exactly on the profile and the
    /// vertical velocity is zeroed.
    pub fn resolve_landing(&self, pos: &mut Vec2, vel: &mut Vec2, size: Vec2) -> bool {
        let ground = self.height_at(pos.x + size.x / 2.0);
        if pos.y + size.y >= ground && vel.y >= 0.0 {
            pos.y = ground - size.y;
            vel.y = 0.0;
            true
        } else {
            false
        }
    }
}
