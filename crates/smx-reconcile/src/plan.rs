//! Per-entry write planning.
//!
//! Given one decoded snapshot entry and the run's index, decide which single
//! write (if any) the entry produces. The index is updated as if the write
//! succeeded; the caller performs the write and aborts the run on failure.

use smx_schemas::{ChainEpoch, DealRecord, DealState, ProtocolVersion, Reporter};
use uuid::Uuid;

use crate::classify::{classify, ChainDealFields};
use crate::epoch::epoch_to_timestamp;
use crate::index::{PendingDealKey, ReconcileIndex};
use crate::price::{normalize_price, PriceError};

/// One snapshot entry, decoded and with its client identity already resolved
/// (or left raw when resolution did not succeed).
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedDeal {
    pub deal_id: u64,
    /// Actor id when resolved, otherwise the raw client string.
    pub client_key: String,
    /// Client exactly as it appears on-chain.
    pub raw_client: String,
    pub provider: String,
    pub piece_cid: String,
    pub piece_size: u64,
    pub label: String,
    pub verified: bool,
    /// `StoragePricePerEpoch` as published (attoFIL, decimal string).
    pub raw_price: String,
    pub fields: ChainDealFields,
}

impl ObservedDeal {
    pub fn key(&self) -> PendingDealKey {
        PendingDealKey::new(
            self.client_key.clone(),
            self.provider.clone(),
            self.piece_cid.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlannedWrite {
    /// Known deal whose canonical state has not moved.
    Unchanged { deal_id: u64 },
    /// Known deal whose recomputed state would move it backward or out of a
    /// terminal state. Nothing is written.
    HeldBack {
        deal_id: u64,
        current: DealState,
        observed: DealState,
    },
    /// Known deal advancing along the lattice.
    Refresh {
        record_id: Uuid,
        from: DealState,
        update: smx_schemas::ChainUpdate,
    },
    /// Oldest pending record under the composite key takes this deal id. The
    /// record's stored state is not consulted, so a swept proposal can bind.
    Bind {
        record_id: Uuid,
        update: smx_schemas::ChainUpdate,
    },
    /// Deal for a tracked piece with no client telemetry.
    InsertExternal { record: DealRecord },
    /// Not ours.
    Ignore { deal_id: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    Price { deal_id: u64, source: PriceError },
    /// Start epoch cannot be represented as a wall-clock timestamp.
    EpochOutOfRange { deal_id: u64, epoch: ChainEpoch },
    PieceSizeOutOfRange { deal_id: u64, piece_size: u64 },
}

impl std::fmt::Display for PlanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanError::Price { deal_id, source } => {
                write!(f, "deal {deal_id}: {source}")
            }
            PlanError::EpochOutOfRange { deal_id, epoch } => {
                write!(f, "deal {deal_id}: start epoch {epoch} out of timestamp range")
            }
            PlanError::PieceSizeOutOfRange {
                deal_id,
                piece_size,
            } => write!(f, "deal {deal_id}: piece size {piece_size} out of range"),
        }
    }
}

impl std::error::Error for PlanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlanError::Price { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl ReconcileIndex {
    /// Decide the write for `deal` at `reference_epoch` and update the index
    /// accordingly. Order: known id, then pending bind, then tracked piece.
    pub fn plan(
        &mut self,
        deal: &ObservedDeal,
        reference_epoch: ChainEpoch,
    ) -> Result<PlannedWrite, PlanError> {
        let observed = classify(&deal.fields, reference_epoch);

        if let Some(known) = self.known.get(deal.deal_id).copied() {
            if known.state == observed {
                return Ok(PlannedWrite::Unchanged {
                    deal_id: deal.deal_id,
                });
            }
            if !known.state.can_transition_to(observed) {
                return Ok(PlannedWrite::HeldBack {
                    deal_id: deal.deal_id,
                    current: known.state,
                    observed,
                });
            }
            self.known.set_state(deal.deal_id, observed);
            return Ok(PlannedWrite::Refresh {
                record_id: known.record_id,
                from: known.state,
                update: deal.fields.to_update(deal.deal_id, observed),
            });
        }

        let key = deal.key();
        if let Some(pending) = self.pending.take_oldest(&key) {
            self.known
                .mark_bound(deal.deal_id, pending.record_id, observed);
            return Ok(PlannedWrite::Bind {
                record_id: pending.record_id,
                update: deal.fields.to_update(deal.deal_id, observed),
            });
        }

        if let Some(protocol) = self.pieces.attribute(&deal.piece_cid) {
            let record = external_record(deal, protocol, observed)?;
            self.known.mark_bound(deal.deal_id, record.id, observed);
            return Ok(PlannedWrite::InsertExternal { record });
        }

        Ok(PlannedWrite::Ignore {
            deal_id: deal.deal_id,
        })
    }
}

fn external_record(
    deal: &ObservedDeal,
    protocol: ProtocolVersion,
    state: DealState,
) -> Result<DealRecord, PlanError> {
    let price = normalize_price(&deal.raw_price, deal.piece_size).map_err(|source| {
        PlanError::Price {
            deal_id: deal.deal_id,
            source,
        }
    })?;
    let created_at =
        epoch_to_timestamp(deal.fields.start_epoch).ok_or(PlanError::EpochOutOfRange {
            deal_id: deal.deal_id,
            epoch: deal.fields.start_epoch,
        })?;
    let piece_size =
        i64::try_from(deal.piece_size).map_err(|_| PlanError::PieceSizeOutOfRange {
            deal_id: deal.deal_id,
            piece_size: deal.piece_size,
        })?;

    Ok(DealRecord {
        id: Uuid::new_v4(),
        reporter: Reporter::external(protocol),
        created_at,
        client: deal.raw_client.clone(),
        provider: deal.provider.clone(),
        label: deal.label.clone(),
        piece_cid: deal.piece_cid.clone(),
        piece_size,
        state,
        deal_id: Some(deal.deal_id),
        start_epoch: Some(deal.fields.start_epoch),
        end_epoch: Some(deal.fields.end_epoch),
        sector_start_epoch: Some(deal.fields.sector_start_epoch),
        duration: deal.fields.duration(),
        verified: deal.verified,
        price,
    })
}
