use std::fmt;

/// Number of quadrant slots on the wall.
pub const SLOT_COUNT: usize = 4;

/// One of the four fixed display quadrants a decoded source is assigned to.
///
/// Slots are immutable for the process lifetime and double as indexes into
/// all per-slot structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Slot {
    pub const ALL: [Slot; SLOT_COUNT] = [
        Slot::TopLeft,
        Slot::TopRight,
        Slot::BottomLeft,
        Slot::BottomRight,
    ];

    pub fn index(self) -> usize {
        match self {
            Slot::TopLeft => 0,
            Slot::TopRight => 1,
            Slot::BottomLeft => 2,
            Slot::BottomRight => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Slot::TopLeft => "top-left",
            Slot::TopRight => "top-right",
            Slot::BottomLeft => "bottom-left",
            Slot::BottomRight => "bottom-right",
        };
        write!(f, "{}", name)
    }
}

/// An immutable decoded image with a presentation timestamp and the slot it
/// originates from.
///
/// Pixel data is RGBA at quadrant resolution. A decode worker creates the
/// frame and hands it to the exchange; the compositor holds it briefly while
/// blitting. Timestamps strictly increase within one worker generation but
/// are not comparable across sources beyond the synthetic pacing scheme.
#[derive(Debug)]
pub struct Frame {
    pub slot: Slot,
    /// Synthetic presentation timestamp, milliseconds on the shared clock.
    pub pts_ms: u64,
    pub width: u32,
    pub height: u32,
    /// Packed RGBA, `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(slot: Slot, pts_ms: u64, width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        Self {
            slot,
            pts_ms,
            width,
            height,
            data,
        }
    }
}
