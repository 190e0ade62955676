use smx_schemas::{ChainEpoch, ChainUpdate, DealState};

/// The four on-chain fields that decide a deal's canonical state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainDealFields {
    pub slash_epoch: ChainEpoch,
    pub sector_start_epoch: ChainEpoch,
    pub start_epoch: ChainEpoch,
    pub end_epoch: ChainEpoch,
}

impl ChainDealFields {
    pub fn duration(&self) -> ChainEpoch {
        self.end_epoch.saturating_sub(self.start_epoch)
    }

    pub fn to_update(&self, deal_id: u64, state: DealState) -> ChainUpdate {
        ChainUpdate {
            deal_id,
            state,
            start_epoch: self.start_epoch,
            end_epoch: self.end_epoch,
            sector_start_epoch: self.sector_start_epoch,
            duration: self.duration(),
        }
    }
}

/// Canonical state from raw on-chain fields, evaluated in strict priority:
///
/// 1. slashed
/// 2. active (sealed into a sector)
/// 3. expired (end epoch passed)
/// 4. proposal_expired (start epoch passed without sealing)
/// 5. published
pub fn classify(fields: &ChainDealFields, reference_epoch: ChainEpoch) -> DealState {
    if fields.slash_epoch > 0 {
        DealState::Slashed
    } else if fields.sector_start_epoch > 0 {
        DealState::Active
    } else if fields.end_epoch < reference_epoch {
        DealState::Expired
    } else if fields.start_epoch < reference_epoch {
        DealState::ProposalExpired
    } else {
        DealState::Published
    }
}
