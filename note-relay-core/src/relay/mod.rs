//! Publish/consume coordination between the store and the bus

pub mod service;
pub mod subscriber;

pub use service::RelayService;
pub use subscriber::spawn_subscriber;
