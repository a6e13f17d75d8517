//! Function discovery: every tag in a function repository names a usable
//! function image. Keyword/description metadata is curated separately
//! (`kpt_porch_core::function`) since it isn't reliably attached to the
//! image itself across registries.

use kpt_errors::{Error, ErrorKind};
use oci_distribution::client::ClientConfig;
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::{Client, Reference};

/// Lists every tag in `registry/repository` as a candidate function image
/// reference, in the order the registry reports them.
pub async fn discover_functions(
    registry: &str,
    repository: &str,
    auth: &RegistryAuth,
) -> Result<Vec<String>, Error> {
    let client = Client::new(ClientConfig::default());
    let reference: Reference = format!("{registry}/{repository}:latest")
        .parse()
        .map_err(|e| Error::with_source(ErrorKind::InvalidInput, format!("invalid OCI reference for {registry}/{repository}"), e))?;

    let tags = client
        .list_tags(&reference, auth, None, None)
        .await
        .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to list function tags", e))?;

    Ok(tags.tags.into_iter().map(|tag| format!("{registry}/{repository}:{tag}")).collect())
}
