//! 产物层：课程计划文本（.txt / .md）与配图（.png）落盘

pub mod store;

pub use store::{Artifact, ArtifactKind, ArtifactStore, SavedText};
