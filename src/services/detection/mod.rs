// Detection Module
// AI text detection core logic organized into specialized submodules:
// - ensemble: Runs both classifiers and blends them into a label + confidence
// - batch: File, directory and explicit-list processing
// - stylometric: Offline lexical scorer backing the local classifier

pub mod batch;
pub mod ensemble;
pub mod stylometric;

pub use batch::{detect_batch, detect_directory, list_directory, read_input_file};
pub use ensemble::{
    apply_adjustments,
    primary_ai_probability,
    secondary_ai_probability,
    Detector,
    DetectorError,
};
pub use stylometric::{score_ai_probability, score_human_likeness, StylometricScore};
