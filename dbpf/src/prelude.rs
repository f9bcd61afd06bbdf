//! The handful of types an embedder touches day to day: open/save a
//! package, look up and mutate resources, register typed wrappers.

pub use crate::clip::ClipResource;
pub use crate::index::{IndexEntry, ResourceKey};
pub use crate::package::{Package, ResourceHandle};
pub use crate::registry::{Factory, Registry};
pub use crate::resource::{RawResource, Resource, ResourceEvent};
pub use crate::stbl::StblResource;
pub use dbpf_common::error::DbpfError;
pub use dbpf_common::Result;
