//! Shared vocabulary for [canwarden](https://github.com/canwarden/canwarden),
//! the CAN bus traffic analyzer and shaper.
//!
//! Everything that crosses a crate boundary lives here: the [`Observation`]
//! that the statistics aggregator and the shaping pipeline both consume, the
//! CAN constants every crate agrees on, and the identifier codec
//! ([`parse_can_id`]) that canonicalizes the heterogeneous identifier
//! encodings a rules document may contain.
//!
//! # Why the codec lives here
//!
//! Rules files accept identifiers as integers, decimal strings, or hex
//! strings (`0x`/`0X` prefixed, underscores permitted). `"0x123"`, `291`,
//! and `"0X1_23"` must all collide to the same canonical `u32`, otherwise a
//! drop rule written one way silently misses a limit written another way.
//! Keeping the single parsing function in the leaf crate guarantees every
//! identifier field in the system goes through identical semantics.

pub mod id;

pub use id::{parse_can_id, IdError, IdValue};

/// Largest valid CAN identifier: 29-bit extended addressing ceiling.
/// Covers 11-bit standard identifiers too.
pub const MAX_CAN_ID: u32 = 0x1FFF_FFFF;

/// Largest 11-bit (standard frame format) identifier.
pub const MAX_STD_CAN_ID: u32 = 0x7FF;

/// Maximum payload length for a classic CAN 2.0 frame, in bytes.
pub const CAN_MAX_DLC: u8 = 8;

/// One observed bus event, as handed to the aggregator or the shaper.
///
/// Produced by a frame source (live bus, capture replay, test fixture) and
/// consumed once. `dlc` is carried exactly as observed — a malformed source
/// may report more than 8 bytes, and downstream consumers reject such
/// observations rather than truncate them.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Observation {
    /// CAN identifier (11-bit or 29-bit).
    pub id: u32,
    /// Data length code: payload size in bytes.
    pub dlc: u8,
    /// Observation time in seconds (wall clock or monotonic, caller's pick —
    /// only differences matter).
    pub timestamp: f64,
    /// 29-bit extended addressing. Carried for fidelity; not used in load
    /// math.
    pub extended: bool,
}

impl Observation {
    pub fn new(id: u32, dlc: u8, timestamp: f64, extended: bool) -> Self {
        Observation {
            id,
            dlc,
            timestamp,
            extended,
        }
    }

    /// Standard-frame observation (11-bit identifier).
    pub fn standard(id: u32, dlc: u8, timestamp: f64) -> Self {
        Self::new(id, dlc, timestamp, false)
    }

    /// Extended-frame observation (29-bit identifier).
    pub fn extended(id: u32, dlc: u8, timestamp: f64) -> Self {
        Self::new(id, dlc, timestamp, true)
    }

    /// The identifier in canonical report form: `0x` + uppercase hex.
    pub fn id_hex(&self) -> String {
        format_id(self.id)
    }
}

/// Format an identifier the way every report and error message does:
/// `0x` + uppercase hex, no padding.
pub fn format_id(id: u32) -> String {
    format!("0x{id:X}")
}
