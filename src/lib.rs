pub mod config;
pub mod error;
pub mod image_check;
pub mod model;
pub mod naming;
pub mod orchestrator;
pub mod prefill;
pub mod qr;
pub mod relay;
pub mod transport;
pub mod validation;
