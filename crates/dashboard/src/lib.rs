pub mod config;
pub mod driver;
pub mod locations;
pub mod selection;
pub mod store;

pub use config::{BaseLayerConfig, BuildingsConfig, ConfigError, DashboardConfig, DeviceProfile};
pub use driver::FetchDriver;
pub use locations::{SavedLocation, SavedLocations};
pub use selection::select_hits;
pub use store::{MapStore, StoreSnapshot};
