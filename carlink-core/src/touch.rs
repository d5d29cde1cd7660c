//! Raw pointer event → normalized touch command conversion.
//!
//! Tracks a single logical pointer. A `Down` latches the pressed flag;
//! `Move` and `Up` are only meaningful while pressed — anything else
//! arriving out of order is dropped rather than forwarded.

use crate::messages::{TouchAction, TouchEvent};

// ── PointerEvent ─────────────────────────────────────────────────

/// Raw pointer phases as delivered by the display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
    Out,
}

/// A raw pointer event in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub x: f64,
    pub y: f64,
}

impl PointerEvent {
    pub fn new(phase: PointerPhase, x: f64, y: f64) -> Self {
        Self { phase, x, y }
    }
}

// ── TouchNormalizer ──────────────────────────────────────────────

/// Converts raw pointer events into protocol-ready [`TouchEvent`]s.
///
/// Coordinates are divided by the *configured* display dimensions, not
/// the raw surface pixel size, so the normalized values are
/// resolution-independent on the receiving side.
#[derive(Debug)]
pub struct TouchNormalizer {
    width: u32,
    height: u32,
    pressed: bool,
}

impl TouchNormalizer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pressed: false,
        }
    }

    /// Whether a pointer is currently held down.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Normalize one raw event. Returns `None` for events that arrive
    /// without a preceding `Down`.
    pub fn normalize(&mut self, event: &PointerEvent) -> Option<TouchEvent> {
        let action = match event.phase {
            PointerPhase::Down => {
                self.pressed = true;
                TouchAction::Down
            }
            PointerPhase::Move if self.pressed => TouchAction::Move,
            PointerPhase::Up | PointerPhase::Cancel | PointerPhase::Out if self.pressed => {
                self.pressed = false;
                TouchAction::Up
            }
            _ => return None,
        };

        Some(TouchEvent {
            x: (event.x / self.width.max(1) as f64) as f32,
            y: (event.y / self.height.max(1) as f64) as f32,
            action,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
