#![forbid(unsafe_code)]

//! Panel geometry: move and eight-direction resize from pointer deltas.
//!
//! Every function here is pure. A gesture captures the pointer origin and
//! the panel [`Bounds`] once, at pointer-down, and every pointer-move
//! recomputes the result from that fixed snapshot and the *total* delta.
//! Nothing is accumulated frame to frame, so a long drag cannot drift.
//!
//! # Invariants
//!
//! 1. `x`, `y` are never negative (they are `u32`; arithmetic saturates at 0).
//! 2. `width >= min.width` and `height >= min.height` after every resize.
//! 3. Resizing from a leading edge (north or west) keeps the opposite edge
//!    fixed as long as the origin does not hit 0.
//! 4. Clamping runs after the directional arithmetic.

use serde::{Deserialize, Serialize};

/// Panel position and size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    /// Create new bounds.
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Raise width/height to at least `min`.
    #[must_use]
    pub fn clamp_to(self, min: MinSize) -> Self {
        Self {
            width: self.width.max(min.width),
            height: self.height.max(min.height),
            ..self
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(20, 20, 400, 450)
    }
}

/// Minimum panel size enforced by every resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinSize {
    pub width: u32,
    pub height: u32,
}

impl MinSize {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for MinSize {
    fn default() -> Self {
        Self::new(250, 200)
    }
}

/// Edge or corner a resize is grabbed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResizeDirection {
    #[serde(rename = "n")]
    North,
    #[serde(rename = "s")]
    South,
    #[serde(rename = "e")]
    East,
    #[serde(rename = "w")]
    West,
    #[serde(rename = "ne")]
    NorthEast,
    #[serde(rename = "nw")]
    NorthWest,
    #[serde(rename = "se")]
    SouthEast,
    #[serde(rename = "sw")]
    SouthWest,
}

/// Which side of an axis a direction grabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// West or north: moving it shifts the origin.
    Leading,
    /// East or south: moving it only changes the size.
    Trailing,
}

impl ResizeDirection {
    /// All eight directions.
    pub const ALL: [Self; 8] = [
        Self::North,
        Self::South,
        Self::East,
        Self::West,
        Self::NorthEast,
        Self::NorthWest,
        Self::SouthEast,
        Self::SouthWest,
    ];

    /// Horizontal component, if any.
    #[must_use]
    pub const fn horizontal_edge(self) -> Option<Edge> {
        match self {
            Self::West | Self::NorthWest | Self::SouthWest => Some(Edge::Leading),
            Self::East | Self::NorthEast | Self::SouthEast => Some(Edge::Trailing),
            Self::North | Self::South => None,
        }
    }

    /// Vertical component, if any.
    #[must_use]
    pub const fn vertical_edge(self) -> Option<Edge> {
        match self {
            Self::North | Self::NorthEast | Self::NorthWest => Some(Edge::Leading),
            Self::South | Self::SouthEast | Self::SouthWest => Some(Edge::Trailing),
            Self::East | Self::West => None,
        }
    }

    /// Short handle name (`"n"`, `"se"`, ...), as used for DOM handle ids.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "n",
            Self::South => "s",
            Self::East => "e",
            Self::West => "w",
            Self::NorthEast => "ne",
            Self::NorthWest => "nw",
            Self::SouthEast => "se",
            Self::SouthWest => "sw",
        }
    }
}

fn to_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

/// New size and origin for one axis.
///
/// Leading edges shrink as the pointer moves forward and push the origin by
/// the same amount the size changed, so the far edge stays put.
fn resize_axis(origin: u32, size: u32, min: u32, delta: i32, edge: Edge) -> (u32, u32) {
    let origin = i64::from(origin);
    let size = i64::from(size);
    let delta = i64::from(delta);
    let min = i64::from(min);
    match edge {
        Edge::Trailing => (to_u32(origin), to_u32((size + delta).max(min))),
        Edge::Leading => {
            let new_size = (size - delta).max(min);
            let new_origin = origin - (new_size - size);
            (to_u32(new_origin), to_u32(new_size))
        }
    }
}

/// Move: translate by the delta, never past the top-left of the viewport.
#[must_use]
pub fn move_bounds(start: Bounds, dx: i32, dy: i32) -> Bounds {
    Bounds {
        x: to_u32(i64::from(start.x) + i64::from(dx)),
        y: to_u32(i64::from(start.y) + i64::from(dy)),
        ..start
    }
}

/// Resize from `direction` by the delta, clamped to `min`.
#[must_use]
pub fn resize_bounds(
    start: Bounds,
    direction: ResizeDirection,
    dx: i32,
    dy: i32,
    min: MinSize,
) -> Bounds {
    let (x, width) = match direction.horizontal_edge() {
        Some(edge) => resize_axis(start.x, start.width, min.width, dx, edge),
        None => (start.x, start.width.max(min.width)),
    };
    let (y, height) = match direction.vertical_edge() {
        Some(edge) => resize_axis(start.y, start.height, min.height, dy, edge),
        None => (start.y, start.height.max(min.height)),
    };
    Bounds {
        x,
        y,
        width,
        height,
    }
}

/// Pointer position in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: i32,
    pub y: i32,
}

impl PointerPosition {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// What a gesture does to the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "direction", rename_all = "snake_case")]
pub enum GestureKind {
    Move,
    Resize(ResizeDirection),
}

/// Snapshot captured at gesture start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gesture {
    pub kind: GestureKind,
    pub origin: PointerPosition,
    pub start: Bounds,
}

impl Gesture {
    /// Bounds for the pointer at `current`, computed from the start snapshot.
    #[must_use]
    pub fn bounds_at(&self, current: PointerPosition, min: MinSize) -> Bounds {
        let dx = current.x.saturating_sub(self.origin.x);
        let dy = current.y.saturating_sub(self.origin.y);
        match self.kind {
            GestureKind::Move => move_bounds(self.start, dx, dy),
            GestureKind::Resize(direction) => resize_bounds(self.start, direction, dx, dy, min),
        }
    }
}

/// Host command for the temporary document-level move/up listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerCommand {
    /// Install global pointer-move and pointer-up listeners.
    Install,
    /// Remove them again.
    Remove,
}

/// Result of feeding one pointer event to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureUpdate {
    /// Bounds to display after this event.
    pub bounds: Bounds,
    /// Listener lifecycle command for the host, if any.
    pub listeners: Option<ListenerCommand>,
    /// `true` when the gesture ended with this event.
    pub finished: bool,
}

/// Tracks at most one drag or resize gesture.
///
/// Listener lifetime equals gesture lifetime: `pointer_down` asks the host
/// to install listeners and `pointer_up` always asks it to remove them,
/// wherever the pointer was released. There is no cancel path besides
/// pointer-up.
#[derive(Debug, Clone, Default)]
pub struct GestureTracker {
    active: Option<Gesture>,
}

impl GestureTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self { active: None }
    }

    /// The gesture in progress, if any.
    #[must_use]
    pub const fn active(&self) -> Option<&Gesture> {
        self.active.as_ref()
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Begin a gesture. Ignored (returns `None`) while another is active.
    pub fn pointer_down(
        &mut self,
        kind: GestureKind,
        origin: PointerPosition,
        start: Bounds,
    ) -> Option<GestureUpdate> {
        if self.active.is_some() {
            return None;
        }
        self.active = Some(Gesture {
            kind,
            origin,
            start,
        });
        Some(GestureUpdate {
            bounds: start,
            listeners: Some(ListenerCommand::Install),
            finished: false,
        })
    }

    /// Recompute bounds for a pointer move. `None` when no gesture is active.
    #[must_use]
    pub fn pointer_move(&self, current: PointerPosition, min: MinSize) -> Option<GestureUpdate> {
        let gesture = self.active?;
        Some(GestureUpdate {
            bounds: gesture.bounds_at(current, min),
            listeners: None,
            finished: false,
        })
    }

    /// End the gesture with final bounds. `None` when no gesture is active.
    pub fn pointer_up(&mut self, current: PointerPosition, min: MinSize) -> Option<GestureUpdate> {
        let gesture = self.active.take()?;
        Some(GestureUpdate {
            bounds: gesture.bounds_at(current, min),
            listeners: Some(ListenerCommand::Remove),
            finished: true,
        })
    }
}
