use log::info;

/// Identity of a capture input: a stable id plus a human-readable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRef {
    pub id: String,
    pub name: String,
}

impl DeviceRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Enumeration seam for platform capture backends. The engine only needs a
/// list; discovery mechanics stay behind the implementor.
pub trait DeviceLister: Send {
    fn list_devices(&self) -> crate::error::Result<Vec<DeviceRef>>;
}

/// Fixed device list, used by synthetic sources and in tests.
pub struct StaticDeviceLister {
    devices: Vec<DeviceRef>,
}

impl StaticDeviceLister {
    pub fn new(devices: Vec<DeviceRef>) -> Self {
        Self { devices }
    }
}

impl DeviceLister for StaticDeviceLister {
    fn list_devices(&self) -> crate::error::Result<Vec<DeviceRef>> {
        info!("Listing {} static devices", self.devices.len());
        Ok(self.devices.clone())
    }
}
