//! Evaluates a Draft's render pipeline and writes the result back.

use kpt_errors::Error;
use kpt_krm::PackageRevisionId;
use kpt_render::{render as render_package, RenderConfig, RuntimeResolver};

use crate::store::PackageRevisionStore;

pub async fn render_revision(
    store: &PackageRevisionStore,
    id: &PackageRevisionId,
    resolver: &dyn RuntimeResolver,
    config: &RenderConfig,
) -> Result<Vec<kpt_errors::Event>, Error> {
    let resources = store.open_revision(id).await?;
    let (rendered, events) = render_package(&resources.package, resolver, config).await?;
    store.update_draft(id, rendered).await?;
    Ok(events)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use kpt_krm::ResourceList;
    use kpt_render::{FunctionRuntime, FunctionRuntimeSpec};

    use super::*;
    use crate::fakes::store_with_fake;

    struct IdentityRuntime;

    #[async_trait]
    impl FunctionRuntime for IdentityRuntime {
        async fn run(&self, input: ResourceList, _timeout: Duration) -> Result<ResourceList, Error> {
            Ok(input)
        }
    }

    struct IdentityResolver;

    #[async_trait]
    impl RuntimeResolver for IdentityResolver {
        async fn resolve(&self, _spec: &FunctionRuntimeSpec) -> Result<Arc<dyn FunctionRuntime>, Error> {
            Ok(Arc::new(IdentityRuntime))
        }
    }

    #[tokio::test]
    async fn render_revision_writes_rendered_content_back_to_the_draft() {
        let store = store_with_fake("blueprints");
        let draft = store.init_draft("blueprints", "nginx", "staging").await.unwrap();

        let mut package = kpt_krm::Package::new();
        package
            .insert_file("namespace.yaml", "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: prod\n")
            .unwrap();
        store.update_draft(&draft.id, package).await.unwrap();

        let events = render_revision(&store, &draft.id, &IdentityResolver, &RenderConfig::default()).await.unwrap();
        assert_eq!(events.len(), 1);

        let resources = store.open_revision(&draft.id).await.unwrap();
        assert!(resources.package.files.contains_key("namespace.yaml"));
    }

    #[tokio::test]
    async fn render_revision_fails_for_an_unknown_revision() {
        let store = store_with_fake("blueprints");
        let ghost = PackageRevisionId::new("blueprints", "nginx", "ghost");

        let err = render_revision(&store, &ghost, &IdentityResolver, &RenderConfig::default()).await.unwrap_err();
        assert_eq!(err.kind(), kpt_errors::ErrorKind::NotFound);
    }
}
