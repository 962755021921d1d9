//! Hand landmark identifiers and the skeletal topology connecting them.
use serde::Serialize;

/// The 21 hand key points, numbered as the landmark model emits them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum HandLandmark {
    Wrist = 0,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandLandmark {
    pub const COUNT: usize = 21;

    pub const ALL: [HandLandmark; Self::COUNT] = [
        Self::Wrist,
        Self::ThumbCmc,
        Self::ThumbMcp,
        Self::ThumbIp,
        Self::ThumbTip,
        Self::IndexFingerMcp,
        Self::IndexFingerPip,
        Self::IndexFingerDip,
        Self::IndexFingerTip,
        Self::MiddleFingerMcp,
        Self::MiddleFingerPip,
        Self::MiddleFingerDip,
        Self::MiddleFingerTip,
        Self::RingFingerMcp,
        Self::RingFingerPip,
        Self::RingFingerDip,
        Self::RingFingerTip,
        Self::PinkyMcp,
        Self::PinkyPip,
        Self::PinkyDip,
        Self::PinkyTip,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Wrist => "WRIST",
            Self::ThumbCmc => "THUMB_CMC",
            Self::ThumbMcp => "THUMB_MCP",
            Self::ThumbIp => "THUMB_IP",
            Self::ThumbTip => "THUMB_TIP",
            Self::IndexFingerMcp => "INDEX_FINGER_MCP",
            Self::IndexFingerPip => "INDEX_FINGER_PIP",
            Self::IndexFingerDip => "INDEX_FINGER_DIP",
            Self::IndexFingerTip => "INDEX_FINGER_TIP",
            Self::MiddleFingerMcp => "MIDDLE_FINGER_MCP",
            Self::MiddleFingerPip => "MIDDLE_FINGER_PIP",
            Self::MiddleFingerDip => "MIDDLE_FINGER_DIP",
            Self::MiddleFingerTip => "MIDDLE_FINGER_TIP",
            Self::RingFingerMcp => "RING_FINGER_MCP",
            Self::RingFingerPip => "RING_FINGER_PIP",
            Self::RingFingerDip => "RING_FINGER_DIP",
            Self::RingFingerTip => "RING_FINGER_TIP",
            Self::PinkyMcp => "PINKY_MCP",
            Self::PinkyPip => "PINKY_PIP",
            Self::PinkyDip => "PINKY_DIP",
            Self::PinkyTip => "PINKY_TIP",
        }
    }
}

impl std::fmt::Display for HandLandmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

use HandLandmark::*;

/// Anatomically adjacent landmark pairs.
pub const HAND_CONNECTIONS: [(HandLandmark, HandLandmark); 21] = [
    // palm
    (Wrist, ThumbCmc),
    (Wrist, IndexFingerMcp),
    (IndexFingerMcp, MiddleFingerMcp),
    (MiddleFingerMcp, RingFingerMcp),
    (RingFingerMcp, PinkyMcp),
    (Wrist, PinkyMcp),
    // thumb
    (ThumbCmc, ThumbMcp),
    (ThumbMcp, ThumbIp),
    (ThumbIp, ThumbTip),
    // index
    (IndexFingerMcp, IndexFingerPip),
    (IndexFingerPip, IndexFingerDip),
    (IndexFingerDip, IndexFingerTip),
    // middle
    (MiddleFingerMcp, MiddleFingerPip),
    (MiddleFingerPip, MiddleFingerDip),
    (MiddleFingerDip, MiddleFingerTip),
    // ring
    (RingFingerMcp, RingFingerPip),
    (RingFingerPip, RingFingerDip),
    (RingFingerDip, RingFingerTip),
    // pinky
    (PinkyMcp, PinkyPip),
    (PinkyPip, PinkyDip),
    (PinkyDip, PinkyTip),
];
