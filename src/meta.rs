//! Acquisition metadata vocabularies shared by every reader.
pub mod activation;
pub mod instrument;

pub use crate::meta::activation::DissociationMethod;
pub use crate::meta::instrument::{IonizationSource, MassAnalyzer};
