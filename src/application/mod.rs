// Application layer - station core, its owning task and snapshot reloads
pub mod reload;
pub mod snapshot_source;
pub mod station_core;
pub mod station_service;
