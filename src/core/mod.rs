//! # Core Navigation Engine
//!
//! Everything that decides what is on screen. It knows nothing about how
//! screens are drawn or where addresses come from.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      COORDINATOR        │
//!                    │                         │
//!                    │  • shell resolution     │
//!                    │  • deep links           │
//!                    │  • active address       │
//!                    └───────────┬─────────────┘
//!                                │ owns
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!     ┌────────────┐      ┌────────────┐      ┌────────────┐
//!     │ StackPath  │      │ StackPath  │      │ FixedPath  │
//!     │  (root)    │      │ (nested)   │      │ (tabs)     │
//!     └────────────┘      └────────────┘      └────────────┘
//!            │                   │                   │
//!            └──────── Screen (identity model) ──────┘
//! ```
//!
//! ## Modules
//!
//! - [`identity`]: `Route`, `Screen` and structural equality/hashing
//! - [`diff`]: Myers edit scripts between screen sequences
//! - [`path`] / [`fixed`]: the two path kinds
//! - [`capability`]: guard, redirect, deep link and host declarations
//! - [`coordinator`]: the resolution engine over all paths
//! - [`inspect`] / [`render`]: read-only views for tooling and renderers
//! - [`config`]: settings file and override hierarchy

pub mod address;
pub mod capability;
pub mod config;
pub mod coordinator;
pub mod diff;
pub mod error;
pub mod fixed;
pub mod identity;
pub mod inspect;
pub mod path;
pub mod render;

pub use address::Address;
pub use coordinator::{Coordinator, NavSettings};
pub use error::NavError;
pub use identity::{Prop, Route, Screen};
pub use path::{Navigation, NavigationPath, PathKey};
