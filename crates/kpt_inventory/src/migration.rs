//! One-shot, idempotent migration from a legacy ConfigMap-based inventory to
//! a `ResourceGroup`.

use camino::Utf8Path;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, DeleteParams};
use kube::Client;
use kpt_errors::{Error, ErrorKind, OperationContext as _};

use crate::resource_group::ObjectReference;
use crate::store::InventoryStore;

/// The legacy inventory template annotation kpt's ConfigMap format used to
/// carry the tracked object list, one `<namespace>_<name>_<group>_<kind>`
/// entry per key.
const LEGACY_DATA_PREFIX_SEPARATOR: char = '_';

/// Name of the local file `kpt live init` used to write alongside a
/// package, naming the ConfigMap the legacy inventory lived in.
const TEMPLATE_FILE_NAME: &str = "inventory-template.yaml";

pub struct MigrationOutcome {
    pub migrated: bool,
    pub objects: Vec<ObjectReference>,
}

/// Migrates the legacy ConfigMap inventory named `name` in `namespace`, if
/// one exists, into a `ResourceGroup` with the same id, then deletes the
/// ConfigMap and the `inventory-template.yaml` file `local_package_path`
/// holds. A no-op (returns `migrated: false`) when no legacy inventory is
/// present, satisfying the "migration is a no-op when nothing to migrate"
/// property.
pub async fn migrate_legacy_inventory(
    client: &Client,
    store: &InventoryStore,
    namespace: &str,
    name: &str,
    local_package_path: &Utf8Path,
) -> Result<MigrationOutcome, Error> {
    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    let legacy = match config_maps.get(name).await {
        Ok(cm) => cm,
        Err(kube::Error::Api(status)) if status.code == 404 => {
            return Ok(MigrationOutcome { migrated: false, objects: vec![] })
        }
        Err(e) => return Err(Error::with_source(ErrorKind::Upstream, "failed to read legacy inventory ConfigMap", e)),
    };

    let id = legacy
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(crate::resource_group::INVENTORY_ID_LABEL))
        .cloned()
        .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "legacy inventory ConfigMap has no inventory-id label"))?;

    let objects = legacy
        .data
        .unwrap_or_default()
        .keys()
        .filter_map(|key| parse_legacy_key(key))
        .collect::<Vec<_>>();

    store.create(namespace, name, id).await.op("migrate_legacy_inventory")?;
    store
        .update_resources(namespace, name, |resources| resources.extend(objects.clone()))
        .await
        .op("migrate_legacy_inventory")?;

    config_maps
        .delete(name, &DeleteParams::default())
        .await
        .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to delete legacy inventory ConfigMap", e))
        .op("migrate_legacy_inventory")?;

    delete_template_file(local_package_path).op("migrate_legacy_inventory")?;

    Ok(MigrationOutcome { migrated: true, objects })
}

/// Removes the local `inventory-template.yaml`, if present. A missing file
/// isn't an error: the migration is idempotent, and a caller may have
/// already cleaned up the package directory by hand.
fn delete_template_file(local_package_path: &Utf8Path) -> Result<(), Error> {
    let path = local_package_path.join(TEMPLATE_FILE_NAME);
    match fs_err::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::with_source(ErrorKind::Upstream, format!("failed to delete {path}"), e)),
    }
}

fn parse_legacy_key(key: &str) -> Option<ObjectReference> {
    let parts: Vec<&str> = key.splitn(4, LEGACY_DATA_PREFIX_SEPARATOR).collect();
    match parts.as_slice() {
        [namespace, name, group, kind] => Some(ObjectReference {
            group: (*group).to_owned(),
            kind: (*kind).to_owned(),
            namespace: (*namespace).to_owned(),
            name: (*name).to_owned(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_legacy_key() {
        let reference = parse_legacy_key("prod_api_apps_Deployment").unwrap();
        assert_eq!(reference.namespace, "prod");
        assert_eq!(reference.name, "api");
        assert_eq!(reference.group, "apps");
        assert_eq!(reference.kind, "Deployment");
    }

    #[test]
    fn rejects_malformed_legacy_key() {
        assert!(parse_legacy_key("not-enough-parts").is_none());
    }

    #[test]
    fn delete_template_file_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap();
        fs_err::write(path.join(TEMPLATE_FILE_NAME), "apiVersion: v1\nkind: ConfigMap\n").unwrap();

        delete_template_file(path).unwrap();

        assert!(!path.join(TEMPLATE_FILE_NAME).exists());
    }

    #[test]
    fn delete_template_file_is_idempotent_when_already_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap();

        delete_template_file(path).unwrap();
    }
}
