//! Bus-load estimation arithmetic.
//!
//! Pure functions, no state. The estimate is deliberately approximate: a
//! fixed per-frame overhead stands in for start-of-frame, arbitration,
//! control, CRC, end-of-frame, inter-frame spacing, and acknowledgment,
//! and bit-stuffing and the longer extended-identifier arbitration field
//! are ignored. Good enough to spot a saturated bus, not a timing model.

/// Fixed overhead bits per classic CAN frame (SOF, arbitration, control,
/// CRC, EOF, IFS, ACK).
pub const FRAME_OVERHEAD_BITS: u32 = 47;

/// Guard against division by zero on degenerate (near-instant) windows.
const MIN_ELAPSED_S: f64 = 1e-9;

/// Estimated on-wire cost of one frame, in bits.
///
/// Strictly increasing in `dlc`: `frame_bits(0) == 47`,
/// `frame_bits(8) == 111`.
pub fn frame_bits(dlc: u8) -> u32 {
    FRAME_OVERHEAD_BITS + u32::from(dlc) * 8
}

/// Estimated bus load as a percentage of nominal bitrate.
///
/// Saturates at 100.0: the estimate is approximate and must never report
/// an impossible value. Monotonically non-decreasing in `total_bits` for
/// fixed `elapsed_s` and `bitrate_bps`.
pub fn load_pct(total_bits: u64, elapsed_s: f64, bitrate_bps: u32) -> f64 {
    let pct = total_bits as f64 / elapsed_s.max(MIN_ELAPSED_S) / f64::from(bitrate_bps) * 100.0;
    pct.min(100.0)
}
