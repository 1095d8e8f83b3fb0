pub mod locks;
pub mod stats_service;
