use std::fmt;

/// Base TCP port; a peer with id `n` listens on `BASE_PORT + n`. The
/// orchestrator itself occupies `BASE_PORT` (id 0).
pub const BASE_PORT: u16 = 8000;

/// Orchestrator's well-known peer id.
pub const ORCHESTRATOR_ID: PeerId = PeerId(0);

/// Unique peer identifier. Supers occupy `1..=nSupers`, leaves occupy
/// `nSupers+1..`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u32);

impl PeerId {
    pub fn port(self) -> u16 {
        BASE_PORT + self.0 as u16
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PeerId {
    fn from(v: u32) -> Self {
        PeerId(v)
    }
}

/// `(originLeafId, sequenceNumber)`, globally unique by construction since
/// each leaf owns its own sequence counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId {
    pub origin: PeerId,
    pub sequence: u64,
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.origin, self.sequence)
    }
}

/// Super-peer overlay shape, chosen at orchestrator startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// Complete graph over the supers; diameter 1.
    AllToAll,
    /// Path graph, super `i` linked to `i-1`/`i+1`; diameter `nSupers - 1`.
    Linear,
}

impl Topology {
    /// Initial TTL the orchestrator hands out for this topology (spec §4.1
    /// step 2): diameter 1 for `AllToAll` (one hop from origin's super
    /// reaches every other super), worst-case diameter for `Linear`.
    pub fn initial_ttl(self, n_supers: u32) -> u32 {
        match self {
            Topology::AllToAll => 2,
            Topology::Linear => n_supers,
        }
    }
}

impl TryFrom<u8> for Topology {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Topology::AllToAll),
            1 => Ok(Topology::Linear),
            _ => Err("topology must be 0 (ALL_TO_ALL) or 1 (LINEAR)"),
        }
    }
}
