//! smx-schemas
//!
//! Shared record shapes for the deal reconciliation workspace. Everything here
//! is plain data: the stores persist it, the reconciler reads and produces it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// On-chain time unit (30 seconds) counted from network genesis.
pub type ChainEpoch = i64;

/// Reporting instance recorded on deals this core creates itself, i.e. deals
/// seen on-chain for a tracked piece without any client telemetry.
pub const EXTERNAL_INSTANCE_ID: &str = "external";

/// Short actor identifiers carry this prefix; anything else is an account key.
pub const ACTOR_ID_PREFIX: &str = "f0";

// ---------------------------------------------------------------------------
// Deal state lattice
// ---------------------------------------------------------------------------

/// Canonical lifecycle state of a deal.
///
/// Forward order: `Proposed → Published → Active → Expired`, with
/// `Proposed | Published → ProposalExpired`. `Slashed` can be entered from any
/// non-terminal state and never leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealState {
    Proposed,
    Published,
    Active,
    Expired,
    ProposalExpired,
    Slashed,
}

impl DealState {
    pub const ALL: [DealState; 6] = [
        DealState::Proposed,
        DealState::Published,
        DealState::Active,
        DealState::Expired,
        DealState::ProposalExpired,
        DealState::Slashed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealState::Proposed => "proposed",
            DealState::Published => "published",
            DealState::Active => "active",
            DealState::Expired => "expired",
            DealState::ProposalExpired => "proposal_expired",
            DealState::Slashed => "slashed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StateParseError> {
        match s {
            "proposed" => Ok(DealState::Proposed),
            "published" => Ok(DealState::Published),
            "active" => Ok(DealState::Active),
            "expired" => Ok(DealState::Expired),
            "proposal_expired" => Ok(DealState::ProposalExpired),
            "slashed" => Ok(DealState::Slashed),
            other => Err(StateParseError {
                raw: other.to_string(),
            }),
        }
    }

    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DealState::Expired | DealState::ProposalExpired | DealState::Slashed
        )
    }

    /// Whether moving from `self` to `next` is a legal forward step.
    ///
    /// Staying in the same state is not a transition and returns `false`.
    pub fn can_transition_to(&self, next: DealState) -> bool {
        use DealState::*;
        if *self == next || self.is_terminal() {
            return false;
        }
        match (*self, next) {
            (_, Slashed) => true,
            (Proposed, Published | Active | Expired | ProposalExpired) => true,
            (Published, Active | Expired | ProposalExpired) => true,
            (Active, Expired) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DealState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored state string did not name a known [`DealState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateParseError {
    pub raw: String,
}

impl std::fmt::Display for StateParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid deal state: '{}'", self.raw)
    }
}

impl std::error::Error for StateParseError {}

// ---------------------------------------------------------------------------
// Reporter / protocol version
// ---------------------------------------------------------------------------

/// Telemetry protocol generation of the reporting client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl ProtocolVersion {
    pub fn from_is_v1(is_v1: bool) -> Self {
        if is_v1 {
            ProtocolVersion::V1
        } else {
            ProtocolVersion::V2
        }
    }

    pub fn is_v1(&self) -> bool {
        matches!(self, ProtocolVersion::V1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reporter {
    pub protocol: ProtocolVersion,
    pub instance_id: String,
    pub ip: String,
}

impl Reporter {
    pub fn external(protocol: ProtocolVersion) -> Self {
        Self {
            protocol,
            instance_id: EXTERNAL_INSTANCE_ID.to_string(),
            ip: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Deals
// ---------------------------------------------------------------------------

/// One tracked storage deal. `deal_id == None` means the deal is still pending
/// (not yet matched to an on-chain deal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealRecord {
    pub id: Uuid,
    pub reporter: Reporter,
    pub created_at: DateTime<Utc>,
    pub client: String,
    pub provider: String,
    pub label: String,
    pub piece_cid: String,
    pub piece_size: i64,
    pub state: DealState,
    pub deal_id: Option<u64>,
    pub start_epoch: Option<ChainEpoch>,
    pub end_epoch: Option<ChainEpoch>,
    pub sector_start_epoch: Option<ChainEpoch>,
    pub duration: ChainEpoch,
    pub verified: bool,
    /// FIL per GiB per epoch.
    pub price: f64,
}

impl DealRecord {
    pub fn is_pending(&self) -> bool {
        self.deal_id.is_none()
    }
}

/// Fields written onto an existing record when it is bound to, or refreshed
/// from, an on-chain deal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainUpdate {
    pub deal_id: u64,
    pub state: DealState,
    pub start_epoch: ChainEpoch,
    pub end_epoch: ChainEpoch,
    pub sector_start_epoch: ChainEpoch,
    pub duration: ChainEpoch,
}

/// Projection of a pending record used to build the matching queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeal {
    pub record_id: Uuid,
    pub client: String,
    pub provider: String,
    pub piece_cid: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// Projection of a record that already owns an on-chain deal ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownDeal {
    pub deal_id: u64,
    pub record_id: Uuid,
    pub state: DealState,
}

// ---------------------------------------------------------------------------
// Pieces (cars)
// ---------------------------------------------------------------------------

/// Distinct `(piece_cid, protocol)` pair observed in the cars collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CarPiece {
    pub piece_cid: String,
    pub protocol: ProtocolVersion,
}

// ---------------------------------------------------------------------------
// Client identities
// ---------------------------------------------------------------------------

/// Which of the two identity encodings a string uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    /// Short actor identifier, e.g. `f01234`.
    ActorId,
    /// Long account key, e.g. `f1abc…` / `f3abc…`.
    AccountKey,
}

impl IdentityKind {
    pub fn of(id: &str) -> Self {
        if id.starts_with(ACTOR_ID_PREFIX) {
            IdentityKind::ActorId
        } else {
            IdentityKind::AccountKey
        }
    }
}

/// Confirmed pairing between an actor id and its account key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMapping {
    pub id: Uuid,
    pub actor_id: String,
    pub account_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClientMapping {
    pub actor_id: String,
    pub account_key: String,
}

// ---------------------------------------------------------------------------
// Verified clients
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedClient {
    pub id: i32,
    #[serde(default)]
    pub address_id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub org_name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub industry: String,
}
