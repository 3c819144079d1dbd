use async_trait::async_trait;
use parking_lot::Mutex;

use crate::entity::EntityId;
use crate::notifications::{
    DeliveryError, NotificationCenter, PlannedTrigger, ScheduledTrigger, TriggerHandle,
};

/// Process-local notification center. Backs tests and the desktop runner where no OS
/// notification service is available.
#[derive(Debug, Default)]
pub struct InMemoryNotificationCenter {
    state: Mutex<CenterState>,
}

#[derive(Debug, Default)]
struct CenterState {
    next_handle: u64,
    permission_denied: bool,
    pending_limit: Option<usize>,
    scheduled: Vec<(TriggerHandle, PlannedTrigger)>,
}

impl InMemoryNotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following registration fail as if the user declined
    /// notification permission.
    pub fn deny_permission(&self) {
        self.state.lock().permission_denied = true;
    }

    pub fn grant_permission(&self) {
        self.state.lock().permission_denied = false;
    }

    /// Cap the number of pending triggers, like the per-app limits mobile
    /// platforms enforce. `None` removes the cap.
    pub fn limit_pending(&self, limit: Option<usize>) {
        self.state.lock().pending_limit = limit;
    }

    /// Drop every pending trigger, as the OS does after a reinstall.
    pub fn clear(&self) {
        self.state.lock().scheduled.clear();
    }

    pub fn scheduled(&self) -> Vec<PlannedTrigger> {
        self.state
            .lock()
            .scheduled
            .iter()
            .map(|(_, trigger)| trigger.clone())
            .collect()
    }

    pub fn scheduled_for(&self, entity_id: &EntityId) -> Vec<PlannedTrigger> {
        self.scheduled()
            .into_iter()
            .filter(|trigger| &trigger.entity_id == entity_id)
            .collect()
    }
}

#[async_trait]
impl NotificationCenter for InMemoryNotificationCenter {
    async fn schedule_trigger(
        &self,
        trigger: &PlannedTrigger,
    ) -> Result<TriggerHandle, DeliveryError> {
        let mut state = self.state.lock();
        if state.permission_denied {
            return Err(DeliveryError::PermissionDenied);
        }
        if state
            .pending_limit
            .is_some_and(|limit| state.scheduled.len() >= limit)
        {
            return Err(DeliveryError::Rejected(
                "pending notification limit reached".to_string(),
            ));
        }
        state.next_handle += 1;
        let handle = TriggerHandle(format!("trigger-{}", state.next_handle));
        state.scheduled.push((handle.clone(), trigger.clone()));
        Ok(handle)
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledTrigger>, DeliveryError> {
        Ok(self
            .state
            .lock()
            .scheduled
            .iter()
            .map(|(handle, trigger)| ScheduledTrigger {
                handle: handle.clone(),
                entity_tag: Some(trigger.entity_id.clone()),
            })
            .collect())
    }

    async fn cancel_trigger(&self, handle: &TriggerHandle) -> Result<(), DeliveryError> {
        let mut state = self.state.lock();
        let before = state.scheduled.len();
        state.scheduled.retain(|(existing, _)| existing != handle);
        if state.scheduled.len() == before {
            return Err(DeliveryError::UnknownTrigger(handle.0.clone()));
        }
        Ok(())
    }
}
