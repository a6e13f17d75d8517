//! An OCI-backed [`kpt_krm::RepositoryDriver`]: one image per revision, the
//! resource tree as a single tar layer, digest-as-truth with tag advisory
//! pointers.

mod discovery;
mod driver;
mod tag_ordering;
mod tagging;
mod tar_layer;

pub use discovery::discover_functions;
pub use driver::OciDriver;
