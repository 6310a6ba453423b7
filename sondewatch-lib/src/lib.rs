pub mod columns;
pub mod config;
pub mod constants;
pub mod description;
pub mod device;
pub mod error;
pub mod events;
pub mod feed;
pub mod kinematics;
pub mod lifecycle;
pub mod observer;
pub mod physics;
pub mod profile;
pub mod record;
pub mod scheduler;
pub mod store;
pub mod table;
pub mod timestamp;

#[cfg(test)]
mod tests;

// Re-export the main entry points
pub use config::EngineConfig;
pub use device::DeviceState;
pub use error::SondeError;
pub use record::Normalizer;
pub use scheduler::Poller;
pub use store::{DeviceStore, SharedStore};
