//! Command-line front end for thememgr.
//!
//! Applies theme bundles unpacked on disk to a sandbox directory that plays
//! the part of the device: overlay registry, wallpapers, sounds, fonts and
//! boot animation all live under the sandbox root.

pub mod bundles;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod sandbox;
