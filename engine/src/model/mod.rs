//! Value types shared by the parser, the pipeline and status observers.
//!
//! - [`descriptor`] - Immutable theme descriptors and their parts
//! - [`selection`] - Caller-provided selection sets
//! - [`status`] - Status events emitted during an apply

pub mod descriptor;
pub mod selection;
pub mod status;

pub use descriptor::{
    AspectRatio, BackgroundAsset, BackgroundKind, DisplayDims, OverlayTarget, SoundAsset,
    SoundKind, TargetCategory, ThemeDescriptor, ThemeDescriptorBuilder,
};
pub use selection::{ResourceKind, SelectionSet};
pub use status::{ApplyState, ApplyStatus};

use serde::{Deserialize, Serialize};

/// User scope passed through to the overlay manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user {}", self.0)
    }
}
