use crate::core::config;
use crate::dispatch::types::DriverId;

/// Source of the drivers eligible for broadcasts.
///
/// Read fresh on every broadcast and every rejection check; membership is
/// assumed stable for the lifetime of one order.
pub trait DriverDirectory: Send + Sync {
    /// Driver chat IDs, in broadcast order.
    fn list_drivers(&self) -> Vec<DriverId>;

    fn contains(&self, driver_id: DriverId) -> bool {
        self.list_drivers().contains(&driver_id)
    }
}

/// Fixed driver list, loaded from `DRIVER_IDS` or given explicitly.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    drivers: Vec<DriverId>,
}

impl StaticDirectory {
    pub fn new(drivers: Vec<DriverId>) -> Self {
        Self { drivers }
    }

    pub fn from_config() -> Self {
        Self::new(config::DRIVER_IDS.clone())
    }
}

impl DriverDirectory for StaticDirectory {
    fn list_drivers(&self) -> Vec<DriverId> {
        self.drivers.clone()
    }
}
