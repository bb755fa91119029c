//! Device registry
//!
//! Three levels of actors: one [`DeviceManager`] owns a [`DeviceGroup`] per
//! home, each group owns a [`TemperatureDevice`] per device. Callers talk to
//! the tree through a [`ManagerHandle`].

mod device;
mod group;
mod handle;
mod manager;
mod messages;

pub use device::TemperatureDevice;
pub use group::DeviceGroup;
pub use handle::ManagerHandle;
pub use manager::DeviceManager;
pub use messages::{
    DeviceCommand, DeviceReading, DevicesByHome, GroupCommand, HomeCreation, ManagerCommand, Readings,
    RegistryError, RegistryResponse,
};
