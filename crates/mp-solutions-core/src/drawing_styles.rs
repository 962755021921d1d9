//! Drawing styles for hand landmark annotations.
//!
//! The table is fixed at compile time: one [`EdgeStyle`] per anatomical
//! connection in [`HAND_CONNECTIONS`](crate::hands::HAND_CONNECTIONS) and
//! one [`PointStyle`] per landmark.
//! Renderers look styles up through [`hand_style_table`], which is built
//! once and shared.
use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::{Serialize, Serializer};

use crate::hands::HandLandmark;

/// A colour in the renderer's native blue-green-red channel order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "[u8; 3]")]
pub struct Color {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Color {
    pub const fn bgr(b: u8, g: u8, r: u8) -> Self {
        Self { b, g, r }
    }
}

impl From<Color> for [u8; 3] {
    fn from(color: Color) -> Self {
        [color.b, color.g, color.r]
    }
}

pub const RED: Color = Color::bgr(54, 67, 244);
pub const GREEN: Color = Color::bgr(118, 230, 0);
pub const BLUE: Color = Color::bgr(192, 101, 21);
pub const YELLOW: Color = Color::bgr(0, 204, 255);
pub const GRAY: Color = Color::bgr(174, 164, 144);
pub const PURPLE: Color = Color::bgr(251, 64, 224);
pub const PEACH: Color = Color::bgr(180, 229, 255);

/// Line width, or a filled shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "i32")]
pub enum Thickness {
    Stroke(u16),
    Filled,
}

impl Thickness {
    /// Raw value renderers use to request a filled shape.
    pub const FILLED_RAW: i32 = -1;

    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Stroke(width) => width as i32,
            Self::Filled => Self::FILLED_RAW,
        }
    }
}

impl From<Thickness> for i32 {
    fn from(thickness: Thickness) -> Self {
        thickness.as_raw()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct EdgeStyle {
    pub color: Color,
    pub thickness: Thickness,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct PointStyle {
    pub color: Color,
    pub thickness: Thickness,
    pub radius: u16,
}

const THICKNESS_WRIST_MCP: Thickness = Thickness::Stroke(3);
const THICKNESS_FINGER: Thickness = Thickness::Stroke(2);
const THICKNESS_DOT: Thickness = Thickness::Filled;
const RADIUS: u16 = 5;

const fn palm() -> EdgeStyle {
    EdgeStyle {
        color: GRAY,
        thickness: THICKNESS_WRIST_MCP,
    }
}

const fn finger(color: Color) -> EdgeStyle {
    EdgeStyle {
        color,
        thickness: THICKNESS_FINGER,
    }
}

const fn dot(color: Color) -> PointStyle {
    PointStyle {
        color,
        thickness: THICKNESS_DOT,
        radius: RADIUS,
    }
}

use HandLandmark::*;

const CONNECTION_STYLES: [(HandLandmark, HandLandmark, EdgeStyle); 21] = [
    (Wrist, ThumbCmc, palm()),
    (ThumbCmc, ThumbMcp, finger(PEACH)),
    (ThumbMcp, ThumbIp, finger(PEACH)),
    (ThumbIp, ThumbTip, finger(PEACH)),
    (Wrist, IndexFingerMcp, palm()),
    (IndexFingerMcp, IndexFingerPip, finger(PURPLE)),
    (IndexFingerPip, IndexFingerDip, finger(PURPLE)),
    (IndexFingerDip, IndexFingerTip, finger(PURPLE)),
    (IndexFingerMcp, MiddleFingerMcp, palm()),
    (MiddleFingerMcp, MiddleFingerPip, finger(YELLOW)),
    (MiddleFingerPip, MiddleFingerDip, finger(YELLOW)),
    (MiddleFingerDip, MiddleFingerTip, finger(YELLOW)),
    (MiddleFingerMcp, RingFingerMcp, palm()),
    (RingFingerMcp, RingFingerPip, finger(GREEN)),
    (RingFingerPip, RingFingerDip, finger(GREEN)),
    (RingFingerDip, RingFingerTip, finger(GREEN)),
    (RingFingerMcp, PinkyMcp, palm()),
    (Wrist, PinkyMcp, palm()),
    (PinkyMcp, PinkyPip, finger(BLUE)),
    (PinkyPip, PinkyDip, finger(BLUE)),
    (PinkyDip, PinkyTip, finger(BLUE)),
];

// Indexed by `HandLandmark::index`.
const LANDMARK_STYLES: [PointStyle; HandLandmark::COUNT] = [
    dot(RED),    // WRIST
    dot(RED),    // THUMB_CMC
    dot(PEACH),  // THUMB_MCP
    dot(PEACH),  // THUMB_IP
    dot(PEACH),  // THUMB_TIP
    dot(RED),    // INDEX_FINGER_MCP
    dot(PURPLE), // INDEX_FINGER_PIP
    dot(PURPLE), // INDEX_FINGER_DIP
    dot(PURPLE), // INDEX_FINGER_TIP
    dot(RED),    // MIDDLE_FINGER_MCP
    dot(YELLOW), // MIDDLE_FINGER_PIP
    dot(YELLOW), // MIDDLE_FINGER_DIP
    dot(YELLOW), // MIDDLE_FINGER_TIP
    dot(RED),    // RING_FINGER_MCP
    dot(GREEN),  // RING_FINGER_PIP
    dot(GREEN),  // RING_FINGER_DIP
    dot(GREEN),  // RING_FINGER_TIP
    dot(RED),    // PINKY_MCP
    dot(BLUE),   // PINKY_PIP
    dot(BLUE),   // PINKY_DIP
    dot(BLUE),   // PINKY_TIP
];

fn edge_key(a: HandLandmark, b: HandLandmark) -> (HandLandmark, HandLandmark) {
    (a.min(b), a.max(b))
}

/// Edge and point styles for a hand skeleton.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleTable {
    edges: BTreeMap<(HandLandmark, HandLandmark), EdgeStyle>,
    points: [PointStyle; HandLandmark::COUNT],
}

impl StyleTable {
    /// Style of the connection between `a` and `b`, in either order. `None`
    /// when the landmarks are not adjacent.
    pub fn edge(&self, a: HandLandmark, b: HandLandmark) -> Option<&EdgeStyle> {
        self.edges.get(&edge_key(a, b))
    }

    pub fn point(&self, landmark: HandLandmark) -> &PointStyle {
        &self.points[landmark.index()]
    }

    /// Connections with their styles, ordered by landmark index.
    pub fn edges(&self) -> impl Iterator<Item = (HandLandmark, HandLandmark, &EdgeStyle)> {
        self.edges.iter().map(|(&(a, b), style)| (a, b, style))
    }

    pub fn points(&self) -> impl Iterator<Item = (HandLandmark, &PointStyle)> {
        HandLandmark::ALL.into_iter().zip(self.points.iter())
    }
}

#[derive(Serialize)]
struct ConnectionEntry<'a> {
    from: HandLandmark,
    to: HandLandmark,
    #[serde(flatten)]
    style: &'a EdgeStyle,
}

#[derive(Serialize)]
struct LandmarkEntry<'a> {
    landmark: HandLandmark,
    #[serde(flatten)]
    style: &'a PointStyle,
}

#[derive(Serialize)]
struct StyleTableView<'a> {
    connections: Vec<ConnectionEntry<'a>>,
    landmarks: Vec<LandmarkEntry<'a>>,
}

impl Serialize for StyleTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StyleTableView {
            connections: self
                .edges()
                .map(|(from, to, style)| ConnectionEntry { from, to, style })
                .collect(),
            landmarks: self
                .points()
                .map(|(landmark, style)| LandmarkEntry { landmark, style })
                .collect(),
        }
        .serialize(serializer)
    }
}

/// Build the hand style table. Every call yields the same table.
pub fn build_style_table() -> StyleTable {
    let edges = CONNECTION_STYLES
        .iter()
        .map(|&(a, b, style)| (edge_key(a, b), style))
        .collect();
    StyleTable {
        edges,
        points: LANDMARK_STYLES,
    }
}

static HAND_STYLE_TABLE: LazyLock<StyleTable> = LazyLock::new(build_style_table);

/// The process-wide hand style table.
pub fn hand_style_table() -> &'static StyleTable {
    &HAND_STYLE_TABLE
}
