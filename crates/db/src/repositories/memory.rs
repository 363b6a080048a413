use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use challan_core::domain::challan::{
    Challan, ChallanId, NewChallan, Stage, StageRecord, StageStatus,
};
use challan_core::domain::device::DeviceCatalogEntry;
use challan_core::domain::identity::Identity;
use challan_core::errors::StoreError;
use challan_core::workflow::{
    transition, ChallanFilter, ChallanStore, StageUpdate, StageUpdateOutcome,
};

#[derive(Default)]
struct MemoryState {
    challans: BTreeMap<i64, Challan>,
    last_id: i64,
    identities: HashMap<String, Identity>,
    devices: Vec<DeviceCatalogEntry>,
}

/// Process-local store. Guard evaluation and the write happen under one
/// write lock.
#[derive(Default)]
pub struct InMemoryChallanStore {
    state: RwLock<MemoryState>,
}

impl InMemoryChallanStore {
    pub fn with_reference_data(
        identities: impl IntoIterator<Item = Identity>,
        devices: impl IntoIterator<Item = DeviceCatalogEntry>,
    ) -> Self {
        let state = MemoryState {
            identities: identities
                .into_iter()
                .map(|identity| (identity.username.clone(), identity))
                .collect(),
            devices: devices.into_iter().collect(),
            ..MemoryState::default()
        };
        Self { state: RwLock::new(state) }
    }
}

#[async_trait::async_trait]
impl ChallanStore for InMemoryChallanStore {
    async fn insert(&self, challan: NewChallan) -> Result<ChallanId, StoreError> {
        if challan.quantity <= 0 {
            return Err(StoreError::InvalidQuantity(challan.quantity));
        }

        let mut state = self.state.write().await;
        if state.challans.values().any(|existing| existing.serial_number == challan.serial_number)
        {
            return Err(StoreError::DuplicateSerialNumber(challan.serial_number));
        }

        state.last_id += 1;
        let id = ChallanId(state.last_id);
        state.challans.insert(
            id.0,
            Challan {
                id,
                device_type: challan.device_type,
                device_model: challan.device_model,
                serial_number: challan.serial_number,
                quantity: challan.quantity,
                purpose: challan.purpose,
                requested_by: challan.requested_by,
                created_at: challan.created_at,
                manager: StageRecord::pending(),
                hod: StageRecord::pending(),
                it_admin: StageRecord::pending(),
                final_status: StageStatus::Pending,
                remarks: None,
            },
        );
        Ok(id)
    }

    async fn get(&self, id: ChallanId) -> Result<Option<Challan>, StoreError> {
        let state = self.state.read().await;
        Ok(state.challans.get(&id.0).cloned())
    }

    async fn list(&self, filter: &ChallanFilter) -> Result<Vec<Challan>, StoreError> {
        let state = self.state.read().await;
        let mut challans = state
            .challans
            .values()
            .filter(|challan| filter.matches(challan))
            .cloned()
            .collect::<Vec<_>>();
        challans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(challans)
    }

    async fn update_stage(&self, update: StageUpdate) -> Result<StageUpdateOutcome, StoreError> {
        let mut state = self.state.write().await;
        let Some(challan) = state.challans.get_mut(&update.challan_id.0) else {
            return Ok(StageUpdateOutcome::NotFound);
        };

        let Some(step) = transition(&challan.statuses(), update.stage, update.decision) else {
            return Ok(StageUpdateOutcome::GuardRejected(challan.clone()));
        };

        let record =
            StageRecord { status: step.to.get(update.stage), decided_at: Some(update.decided_at) };
        match update.stage {
            Stage::Manager => challan.manager = record,
            Stage::Hod => challan.hod = record,
            Stage::ItAdmin => challan.it_admin = record,
        }
        challan.final_status = step.final_status;
        if let Some(remarks) = update.remarks {
            challan.remarks = Some(remarks);
        }

        Ok(StageUpdateOutcome::Applied(challan.clone()))
    }

    async fn lookup_identity(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        let state = self.state.read().await;
        Ok(state.identities.get(username).cloned())
    }

    async fn list_device_catalog(&self) -> Result<Vec<DeviceCatalogEntry>, StoreError> {
        let state = self.state.read().await;
        let mut devices = state.devices.clone();
        devices.sort_by(|a, b| {
            a.device_type.cmp(&b.device_type).then_with(|| a.device_model.cmp(&b.device_model))
        });
        Ok(devices)
    }
}
