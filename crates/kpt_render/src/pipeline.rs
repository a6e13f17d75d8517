//! The render engine: mutators then validators, subpackage recursion, and
//! merge-back with provenance preserved.

use std::sync::Arc;

use async_trait::async_trait;
use kpt_errors::{Error, ErrorKind, Event, EventAction, EventGroup, OperationContext as _};
use kpt_krm::document::Document;
use kpt_krm::{Package, Resource};

use crate::config::RenderConfig;
use crate::manifest::{self, FunctionRuntimeSpec, FunctionSpec, Pipeline};
use crate::runtime::{ContainerRuntime, ExecRuntime, FunctionRuntime, WasmRuntime};

/// Builds the runtime a function's manifest entry asks for. A container
/// runtime needs a live Docker client, which the caller owns; this crate
/// doesn't open one itself.
#[async_trait]
pub trait RuntimeResolver: Send + Sync {
    async fn resolve(&self, spec: &FunctionRuntimeSpec) -> Result<Arc<dyn FunctionRuntime>, Error>;
}

/// Resolves image functions against a caller-supplied `bollard::Docker`
/// client, exec functions as local paths, and wasm functions as module
/// paths on disk.
pub struct DefaultResolver {
    pub docker: Option<bollard::Docker>,
    pub config: RenderConfig,
}

#[async_trait]
impl RuntimeResolver for DefaultResolver {
    async fn resolve(&self, spec: &FunctionRuntimeSpec) -> Result<Arc<dyn FunctionRuntime>, Error> {
        match spec {
            FunctionRuntimeSpec::Image(image) => {
                let docker = self.docker.clone().ok_or_else(|| {
                    Error::new(ErrorKind::InvalidInput, "no container runtime configured for image functions")
                })?;
                let mut runtime = ContainerRuntime::new(docker, image.clone())
                    .with_network_policy(self.config.default_network_policy);
                if let Some(limit) = self.config.default_memory_limit_bytes {
                    runtime = runtime.with_memory_limit_bytes(limit);
                }
                Ok(Arc::new(runtime))
            }
            FunctionRuntimeSpec::Exec(path) => Ok(Arc::new(ExecRuntime::new(path.clone()))),
            FunctionRuntimeSpec::Wasm(path) => Ok(Arc::new(WasmRuntime::new(path.clone())?)),
        }
    }
}

/// Renders a package: runs its subpackages depth-first, merges their
/// resources back with path prefixes rewritten, then runs this package's
/// own pipeline over the combined stream. Returns the package with its
/// files updated in place and the ordered event stream.
pub async fn render(
    package: &Package,
    resolver: &dyn RuntimeResolver,
    config: &RenderConfig,
) -> Result<(Package, Vec<Event>), Error> {
    let (own, subpackages) = package.split_subpackages();
    let mut events = vec![Event {
        group: EventGroup::Render,
        action: EventAction::Init,
        subject: "package".to_owned(),
    }];

    let mut merged = own.clone();
    for (root, subpackage) in &subpackages {
        let (rendered_sub, sub_events) = Box::pin(render(subpackage, resolver, config)).await?;
        events.extend(sub_events);
        for (path, contents) in rendered_sub.files {
            merged.insert_file(format!("{root}/{path}"), contents)?;
        }
    }

    let pipeline = manifest::load_pipeline(&merged)?;
    let mut documents: Vec<Document> = merged
        .documents()?
        .into_iter()
        .filter(|d| !is_manifest_path(&d.resource.provenance.path))
        .collect();
    run_pipeline(&merged, &pipeline, &mut documents, resolver, config, &mut events).await?;
    write_back(&mut merged, &documents)?;

    Ok((merged, events))
}

fn is_manifest_path(path: &str) -> bool {
    path == kpt_krm::MANIFEST_FILE_NAME || path.ends_with(&format!("/{}", kpt_krm::MANIFEST_FILE_NAME))
}

async fn run_pipeline(
    package: &Package,
    pipeline: &Pipeline,
    documents: &mut Vec<Document>,
    resolver: &dyn RuntimeResolver,
    config: &RenderConfig,
    events: &mut Vec<Event>,
) -> Result<(), Error> {
    for function in &pipeline.mutators {
        run_function(package, function, documents, resolver, config, events, false).await?;
    }
    for function in &pipeline.validators {
        run_function(package, function, documents, resolver, config, events, true).await?;
    }
    Ok(())
}

async fn run_function(
    package: &Package,
    function: &FunctionSpec,
    documents: &mut Vec<Document>,
    resolver: &dyn RuntimeResolver,
    config: &RenderConfig,
    events: &mut Vec<Event>,
    is_validator: bool,
) -> Result<(), Error> {
    let subject = function_subject(function);
    let runtime = resolver.resolve(&function.runtime).await?;
    let function_config = manifest::resolve_config(package, &function.config)?;

    let resources: Vec<Resource> = documents.iter().map(|d| d.resource.clone()).collect();
    let input = kpt_krm::ResourceList::from_resources(&resources, function_config);
    let output = runtime
        .run(input, config.default_timeout)
        .await
        .op(format!("running function {subject}"))?;

    if output.has_fatal_results() {
        let message = output
            .results
            .iter()
            .filter(|r| r.severity == kpt_krm::Severity::Error)
            .map(|r| r.message.clone())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::new(
            ErrorKind::FunctionFailed,
            format!("{subject} reported fatal results: {message}"),
        ));
    }

    events.push(Event {
        group: EventGroup::Render,
        action: EventAction::Apply,
        subject: subject.clone(),
    });

    if is_validator {
        return Ok(());
    }

    let new_resources = output.into_resources()?;
    merge_results(documents, new_resources)?;
    Ok(())
}

/// Correlates a function's output resources back to the [`Document`]s they
/// came from by identity, so a mutator that edits content without changing
/// `apiVersion`/`kind`/`metadata.name`/`metadata.namespace` leaves the
/// originating file and its comments untouched. A resource with no match
/// (new, or identity changed) becomes a new document with no comment table
/// in a synthetic file.
fn merge_results(documents: &mut Vec<Document>, new_resources: Vec<Resource>) -> Result<(), Error> {
    let mut by_identity: std::collections::HashMap<kpt_krm::ResourceIdentity, usize> =
        std::collections::HashMap::new();
    for (index, document) in documents.iter().enumerate() {
        by_identity.insert(document.resource.identity(), index);
    }

    let mut result = Vec::with_capacity(new_resources.len());
    for resource in new_resources {
        if let Some(&index) = by_identity.get(&resource.identity()) {
            let mut document = documents[index].clone();
            document.set_resource(resource);
            result.push(document);
        } else {
            result.push(synthetic_document(resource));
        }
    }
    *documents = result;
    Ok(())
}

fn synthetic_document(resource: Resource) -> Document {
    let path = format!("generated/{}-{}.yaml", resource.kind.to_lowercase(), resource.name);
    Document::from_resource(path, resource)
}

fn write_back(package: &mut Package, documents: &[Document]) -> Result<(), Error> {
    let mut by_path: indexmap::IndexMap<String, Vec<&Document>> = indexmap::IndexMap::new();
    for document in documents {
        by_path.entry(document.resource.provenance.path.clone()).or_default().push(document);
    }

    package
        .files
        .retain(|path, _| !is_yaml_path(path) || is_manifest_path(path) || by_path.contains_key(path));
    for (path, docs) in by_path {
        let rendered = docs
            .iter()
            .map(|d| d.render())
            .collect::<Vec<_>>()
            .join("---\n");
        package.insert_file(path, rendered)?;
    }
    Ok(())
}

fn is_yaml_path(path: &str) -> bool {
    path.ends_with(".yaml") || path.ends_with(".yml") || path.ends_with(kpt_krm::MANIFEST_FILE_NAME)
}

fn function_subject(function: &FunctionSpec) -> String {
    match &function.runtime {
        FunctionRuntimeSpec::Image(image) => image.clone(),
        FunctionRuntimeSpec::Exec(path) => path.clone(),
        FunctionRuntimeSpec::Wasm(path) => path.clone(),
    }
}
