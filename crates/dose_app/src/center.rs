use async_trait::async_trait;
use dose_core::memory::InMemoryNotificationCenter;
use dose_core::notifications::{
    DeliveryError, NotificationCenter, PlannedTrigger, ScheduledTrigger, TriggerHandle,
};
use tracing::info;

/// Desktop stand-in for the OS notification service: keeps triggers in
/// memory and logs every change.
#[derive(Debug, Default)]
pub struct LoggingNotificationCenter {
    inner: InMemoryNotificationCenter,
}

impl LoggingNotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> Vec<PlannedTrigger> {
        self.inner.scheduled()
    }
}

#[async_trait]
impl NotificationCenter for LoggingNotificationCenter {
    async fn schedule_trigger(
        &self,
        trigger: &PlannedTrigger,
    ) -> Result<TriggerHandle, DeliveryError> {
        let handle = self.inner.schedule_trigger(trigger).await?;
        info!(
            handle = %handle.0,
            entity_id = %trigger.entity_id,
            trigger = ?trigger.trigger,
            "scheduled notification"
        );
        Ok(handle)
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledTrigger>, DeliveryError> {
        self.inner.list_scheduled().await
    }

    async fn cancel_trigger(&self, handle: &TriggerHandle) -> Result<(), DeliveryError> {
        self.inner.cancel_trigger(handle).await?;
        info!(handle = %handle.0, "cancelled notification");
        Ok(())
    }
}
