//! Pure decision logic for the Updraft SDK.
//!
//! This crate provides the I/O-free pieces the facade composes:
//! - Semantic version parsing and ordering.
//! - Channel descriptor decoding and validation.
//! - The update decision engine that turns a descriptor plus local state into
//!   an [`UpdateState`].

mod channel;
mod engine;
mod version;

/// Channel descriptor model, typed decode, and the update-type policy codes.
pub use channel::{ChannelDescriptor, DescriptorError, UpdateType};
/// Decision engine inputs/outputs and the shared popup interval rule.
pub use engine::{AppIdentity, LocalStateSnapshot, UpdateState, evaluate, popup_due};
/// Version model and parse error.
pub use version::{InvalidVersionFormat, SemanticVersion, VersionComponent};
