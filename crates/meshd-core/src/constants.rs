//! Protocol constants for the meshd control plane.

/// Wire protocol version stamped into every routing frame.
pub const PANN_VERSION: u8 = 1;

/// Frame type selector for proactive announcements.
pub const FRAME_TYPE_PANN: u8 = 0;

/// Size of an encoded PANN frame in bytes.
///
/// version(1) + type(1) + orig_addr(6) + orig_sn(8) + hop_count(1) +
/// ttl(1) + target_addr(6) + metric(4) + flags(1)
pub const PANN_FRAME_SIZE: usize = 29;

/// Highest TTL a frame may carry on the wire (802.11s element TTL).
pub const MAX_FRAME_TTL: u8 = 31;

/// Default initial TTL for frames originated by this node.
pub const DEFAULT_ELEMENT_TTL: u8 = 31;

/// Flags bit marking the originator as a mesh gate.
pub const FLAG_GATE: u8 = 0b0000_0001;

/// Flags bit requesting a unicast PANN reply from the target.
pub const FLAG_REPLY_REQUESTED: u8 = 0b0000_0010;

/// UDP port routing frames ride on between mesh peers.
pub const ROUTING_UDP_PORT: u16 = 6668;
