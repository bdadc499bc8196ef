//! PANN frame wire format parsing and serialization.
//!
//! A PANN (proactive announcement) is the single routing frame type of the
//! control plane: a root or gate advertises itself with a sequence number
//! and cumulative metric so peers learn a path to it. Frames are fixed-size
//! binary records with big-endian integer fields.

use crate::constants::{
    FLAG_GATE, FLAG_REPLY_REQUESTED, FRAME_TYPE_PANN, MAX_FRAME_TTL, PANN_FRAME_SIZE, PANN_VERSION,
};
use crate::error::FrameError;
use crate::types::MacAddress;

/// A decoded proactive announcement frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct PannFrame {
    /// Originator of the announcement.
    pub orig_addr: MacAddress,
    /// Originator's sequence number.
    pub orig_sn: u64,
    /// Hops the announcement has travelled so far.
    pub hop_count: u8,
    /// Remaining time-to-live.
    pub ttl: u8,
    /// Target of the announcement; broadcast for periodic root PANNs.
    pub target_addr: MacAddress,
    /// Cumulative path metric from the originator to the last transmitter.
    pub metric: u32,
    /// The originator is a mesh gate.
    pub is_gate: bool,
    /// The originator requests a unicast PANN from the target.
    pub reply_requested: bool,
}

impl PannFrame {
    /// Parse a frame from wire bytes.
    ///
    /// Frames are exactly [`PANN_FRAME_SIZE`] bytes; anything shorter or
    /// longer is malformed, as is an unknown version or type selector or a
    /// TTL above [`MAX_FRAME_TTL`]. Unassigned flag bits are ignored.
    #[must_use = "parsing may fail; check the Result"]
    pub fn parse(raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() < PANN_FRAME_SIZE {
            return Err(FrameError::TooShort {
                min: PANN_FRAME_SIZE,
                actual: raw.len(),
            });
        }
        if raw.len() > PANN_FRAME_SIZE {
            return Err(FrameError::TrailingBytes {
                expected: PANN_FRAME_SIZE,
                actual: raw.len(),
            });
        }
        if raw[0] != PANN_VERSION {
            return Err(FrameError::InvalidVersion(raw[0]));
        }
        if raw[1] != FRAME_TYPE_PANN {
            return Err(FrameError::InvalidFrameType(raw[1]));
        }

        let orig_bytes: [u8; 6] = raw[2..8].try_into().expect("slice is exactly 6 bytes");
        let sn_bytes: [u8; 8] = raw[8..16].try_into().expect("slice is exactly 8 bytes");
        let hop_count = raw[16];
        let ttl = raw[17];
        if ttl > MAX_FRAME_TTL {
            return Err(FrameError::TtlOutOfRange(ttl));
        }
        let target_bytes: [u8; 6] = raw[18..24].try_into().expect("slice is exactly 6 bytes");
        let metric_bytes: [u8; 4] = raw[24..28].try_into().expect("slice is exactly 4 bytes");
        let flags = raw[28];

        Ok(PannFrame {
            orig_addr: MacAddress::new(orig_bytes),
            orig_sn: u64::from_be_bytes(sn_bytes),
            hop_count,
            ttl,
            target_addr: MacAddress::new(target_bytes),
            metric: u32::from_be_bytes(metric_bytes),
            is_gate: flags & FLAG_GATE != 0,
            reply_requested: flags & FLAG_REPLY_REQUESTED != 0,
        })
    }

    /// Serialize the frame to wire format.
    #[must_use = "serialization produces a new Vec without modifying the frame"]
    pub fn serialize(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(PANN_FRAME_SIZE);
        result.push(PANN_VERSION);
        result.push(FRAME_TYPE_PANN);
        result.extend_from_slice(self.orig_addr.as_ref());
        result.extend_from_slice(&self.orig_sn.to_be_bytes());
        result.push(self.hop_count);
        result.push(self.ttl);
        result.extend_from_slice(self.target_addr.as_ref());
        result.extend_from_slice(&self.metric.to_be_bytes());

        let mut flags = 0u8;
        if self.is_gate {
            flags |= FLAG_GATE;
        }
        if self.reply_requested {
            flags |= FLAG_REPLY_REQUESTED;
        }
        result.push(flags);
        result
    }
}
