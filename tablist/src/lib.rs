//! # Tab List Overlay
//!
//! Presents each connected viewer with its own synthetic identity list in
//! place of the real participants, without touching server-side participant
//! state. Everything the overlay needs from the game server is reached through
//! bindings resolved once at startup, so one build works across protocol
//! revisions whose internal types differ.
//!
//! ## Module Organization
//!
//! ### Host Module (`host`)
//! The seam to the game server:
//! - `Host` trait for type lookup and session enumeration
//! - Dynamic `Value` and `HostObject` model the bindings operate on
//! - `SimulatedHost`, an in-memory server for two revisions
//!
//! ### Resolver Module (`resolver`)
//! Expands `{nms}`, `{obc}` and `{version}` placeholders in symbolic names and
//! locates types, fields, methods, constructors and enum constants.
//!
//! ### Handles Module (`handles`)
//! Immutable accessors for resolved members, carrying their declared shapes.
//!
//! ### Packets Module (`packets`)
//! Builds identity list packets in the real-participant and synthetic
//! shapes and dispatches them to viewers. Revision differences are settled
//! once, at bind time.
//!
//! ### Registry Module (`registry`)
//! Binds the packet handles once per process and shares them.
//!
//! ### Overlay Module (`overlay`)
//! The 80-slot table per viewer and its show/hide state machine.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tablist::host::{Revision, SimulatedHost};
//! use tablist::overlay::OverlayManager;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let host = Arc::new(SimulatedHost::new(Revision::V1_8R3));
//!     let synth = tablist::registry::init(host.as_ref())?;
//!     let manager = OverlayManager::new(host.clone(), synth);
//!
//!     let (viewer, _frames) = host.connect("Steve");
//!     manager.attach(viewer.clone()).await;
//!     manager.show(viewer.id).await?;
//!     manager.hide(viewer.id).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod handles;
pub mod host;
pub mod overlay;
pub mod packets;
pub mod registry;
pub mod resolver;

pub use error::{InvokeError, ResolveError};
pub use overlay::{LayoutProvider, OverlayManager, OverlayState, SyntheticEntry};
pub use packets::{PacketSynthesizer, PassReport, RecordShape, SyntheticShape};
