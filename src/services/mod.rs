// Detector Core Services

pub mod text_processor;
pub mod config_store;
pub mod providers;
pub mod security;
pub mod detection;

pub use text_processor::*;
pub use config_store::*;
pub use providers::*;
pub use security::*;

pub use detection::{
    detect_batch,
    detect_directory,
    Detector,
    DetectorError,
};
