//! DBPF v2 package container, resource registry, and typed wrappers
//! for The Sims 4.
//!
//! The crate is organized bottom-up, mirroring spec component order:
//! [`compressor`] and [`header`] are leaf codecs, [`index`] builds on
//! both to describe the resource table, [`package`] composes them into
//! an owning container, [`registry`] dispatches a container's raw
//! chunks to typed wrappers ([`stbl`], [`clip`]) built on the
//! memoizing base in [`resource`].
//!
//! Enable the `async` feature for suspension-point variants of the
//! I/O-bound operations ([`async_io`]); the default build is entirely
//! synchronous.

pub mod clip;
pub mod compressor;
pub mod header;
pub mod index;
pub mod package;
pub mod registry;
pub mod resource;
pub mod stbl;

#[cfg(feature = "async")]
pub mod async_io;

pub mod prelude;

pub use dbpf_common::error::DbpfError;
pub use dbpf_common::Result;
pub use header::Header;
pub use index::{IndexEntry, ResourceKey};
pub use package::{Package, ResourceHandle};
pub use registry::{Factory, Registry};
pub use resource::{RawResource, Resource};
