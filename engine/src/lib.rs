//! # thememgr engine
//!
//! Core library for applying theme bundles to a running system. A theme
//! bundle carries wallpapers, lock-screen images, system sounds, a boot
//! animation, fonts and a set of overlay packages; this crate parses the
//! bundle manifest and drives the apply pipeline that swaps those resources
//! in, reporting progress through a durable status channel.
//!
//! ## Modules
//!
//! - [`model`] - Theme descriptors, selection sets and status events
//! - [`manifest`] - Manifest parser and catalog listing
//! - [`bundle`] - Bundle asset sources (the read side of a theme package)
//! - [`installer`] - Blocking adapter over callback-driven package installers
//! - [`appliers`] - Wallpaper, sound, overlay, boot animation and font appliers
//! - [`status`] - Multi-listener status channel and caller-facing streams
//! - [`pipeline`] - The apply state machine and stale overlay removal
//! - [`config`] - Engine configuration
//! - [`errors`] - Error types shared across the engine

pub mod appliers;
pub mod bundle;
pub mod config;
pub mod errors;
pub mod installer;
pub mod manifest;
pub mod model;
pub mod pipeline;
pub mod status;

pub use config::EngineConfig;
pub use errors::{ApplyError, EngineResult};
pub use manifest::{list_descriptors, parse_manifest};
pub use model::{ApplyState, ApplyStatus, DisplayDims, SelectionSet, ThemeDescriptor};
pub use pipeline::{ApplyHandle, Collaborators, ThemeManager};
