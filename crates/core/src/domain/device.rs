use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCatalogEntry {
    pub device_type: String,
    pub device_model: String,
    pub category: String,
}
