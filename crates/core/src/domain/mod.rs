pub mod challan;
pub mod device;
pub mod identity;
