//! Linker model
//!
//! Resources are owned by one ID-indexed collection; contexts and slots
//! refer to them by [`ResourceId`] only.

mod config;
mod context;
mod library;
mod resource;

pub use config::{Config, VERSION_MAJOR, VERSION_MINOR};
pub use context::{Assignment, Context, ContextKind, Contexts, NmiFlags, Slot, SlotError, SlotIndex};
pub use library::{LIBRARY_FILE, LIBRARY_LABELS_FILE, Library, LibraryFile};
pub use resource::{Directives, EXTRA_BYTES_FILE, RESOURCE_FILE, Resource, ResourceId, Resources, SA1_LABELS};
