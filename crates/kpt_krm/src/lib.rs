//! The Kubernetes Resource Model data types shared across kpt: a parsed
//! [`Resource`], its [`ResourceIdentity`], a [`Package`] directory tree, the
//! comment-preserving [`document`] model, and the function wire format
//! [`ResourceList`].

pub mod document;
mod driver;
mod identity;
mod package;
mod resource;
mod resource_list;
mod revision;

pub use document::Document;
pub use driver::RepositoryDriver;
pub use identity::ResourceIdentity;
pub use package::{Package, MANIFEST_FILE_NAME};
pub use resource::{InjectionPolicy, Provenance, Resource};
pub use resource_list::{FileRef, FunctionResult, ResourceList, ResourceRef, Severity};
pub use revision::{
    compare_revisions, next_revision, Lifecycle, PackageRevisionId, PackageRevisionMetadata,
    PackageRevisionResources, Task,
};
