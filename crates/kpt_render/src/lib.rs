//! Package rendering: runs a package's declared pipeline of mutator and
//! validator functions over its resource stream.

mod config;
mod manifest;
pub mod pipeline;
pub mod runtime;

pub use config::RenderConfig;
pub use manifest::{load_pipeline, FunctionConfig, FunctionRuntimeSpec, FunctionSpec, Pipeline};
pub use pipeline::{render, DefaultResolver, RuntimeResolver};
pub use runtime::{ContainerRuntime, ExecRuntime, FunctionRuntime, NetworkPolicy, WasmRuntime};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use kpt_errors::Error;
    use kpt_krm::{Package, ResourceList};

    use super::*;

    struct NoopResolver;

    struct IdentityRuntime;

    #[async_trait]
    impl FunctionRuntime for IdentityRuntime {
        async fn run(&self, input: ResourceList, _timeout: Duration) -> Result<ResourceList, Error> {
            Ok(input)
        }
    }

    #[async_trait]
    impl RuntimeResolver for NoopResolver {
        async fn resolve(&self, _spec: &FunctionRuntimeSpec) -> Result<Arc<dyn FunctionRuntime>, Error> {
            Ok(Arc::new(IdentityRuntime))
        }
    }

    fn package_with_annotation_mutator() -> Package {
        let mut pkg = Package::new();
        pkg.insert_file(
            kpt_krm::MANIFEST_FILE_NAME,
            "apiVersion: kpt.dev/v1\nkind: Kptfile\nmetadata:\n  name: demo\npipeline:\n  mutators:\n    - exec: ./noop\n",
        )
        .unwrap();
        pkg.insert_file(
            "namespace.yaml",
            "# keep me\napiVersion: v1\nkind: Namespace\nmetadata:\n  name: prod\n",
        )
        .unwrap();
        pkg
    }

    #[tokio::test]
    async fn empty_pipeline_leaves_resources_untouched() {
        let mut pkg = Package::new();
        pkg.insert_file("namespace.yaml", "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: prod\n")
            .unwrap();
        let config = RenderConfig::default();
        let (rendered, events) = render(&pkg, &NoopResolver, &config).await.unwrap();
        assert_eq!(rendered.files.get("namespace.yaml"), pkg.files.get("namespace.yaml"));
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn identity_function_preserves_file_and_comments() {
        let pkg = package_with_annotation_mutator();
        let config = RenderConfig::default();
        let (rendered, _events) = render(&pkg, &NoopResolver, &config).await.unwrap();
        let contents = rendered.files.get("namespace.yaml").unwrap();
        assert!(contents.contains("# keep me"));
        assert!(contents.contains("name: prod"));
    }

    #[tokio::test]
    async fn subpackage_resources_are_lifted_with_path_prefix() {
        let mut pkg = Package::new();
        pkg.insert_file(kpt_krm::MANIFEST_FILE_NAME, "apiVersion: kpt.dev/v1\nkind: Kptfile\nmetadata:\n  name: parent\n")
            .unwrap();
        pkg.insert_file(
            "child/Kptfile",
            "apiVersion: kpt.dev/v1\nkind: Kptfile\nmetadata:\n  name: child\n",
        )
        .unwrap();
        pkg.insert_file(
            "child/namespace.yaml",
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: dev\n",
        )
        .unwrap();

        let config = RenderConfig::default();
        let (rendered, _events) = render(&pkg, &NoopResolver, &config).await.unwrap();
        assert!(rendered.files.contains_key("child/namespace.yaml"));
        assert!(rendered.files.contains_key("child/Kptfile"));
    }
}
