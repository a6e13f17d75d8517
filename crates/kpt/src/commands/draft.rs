use camino::Utf8Path;
use kpt_krm::PackageRevisionId;
use kpt_porch_core::OrchestratorConfig;

use crate::cli::{DraftClone, DraftCommand, DraftGet, DraftInit, DraftUpdate};
use crate::{package_io, repositories};

pub async fn run(command: DraftCommand, repositories_file: &Utf8Path, config: &OrchestratorConfig) -> anyhow::Result<()> {
    match command {
        DraftCommand::Init(args) => init(args, repositories_file, config).await,
        DraftCommand::Clone(args) => clone(args, repositories_file, config).await,
        DraftCommand::Update(args) => update(args, repositories_file, config).await,
        DraftCommand::Get(args) => get(args, repositories_file, config).await,
    }
}

async fn init(args: DraftInit, repositories_file: &Utf8Path, config: &OrchestratorConfig) -> anyhow::Result<()> {
    let store = repositories::store_from_file(repositories_file, &config.cache_directory)?;
    let metadata = store.init_draft(&args.repository, &args.package, &args.workspace).await?;
    println!("created {:?}", metadata.id);
    Ok(())
}

async fn clone(args: DraftClone, repositories_file: &Utf8Path, config: &OrchestratorConfig) -> anyhow::Result<()> {
    let store = repositories::store_from_file(repositories_file, &config.cache_directory)?;
    let source = PackageRevisionId::new(args.source_repository, args.source_package, args.source_workspace)
        .published(args.source_revision);
    let metadata = store
        .clone_revision(&source, &args.target_repository, &args.target_package, &args.target_workspace)
        .await?;
    println!("created {:?} cloned from {:?}", metadata.id, source);
    Ok(())
}

async fn update(args: DraftUpdate, repositories_file: &Utf8Path, config: &OrchestratorConfig) -> anyhow::Result<()> {
    let store = repositories::store_from_file(repositories_file, &config.cache_directory)?;
    let id = PackageRevisionId::new(args.repository, args.package, args.workspace);
    let package = package_io::read_package(&args.path)?;
    let metadata = store.update_draft(&id, package).await?;
    println!("updated {:?}", metadata.id);
    Ok(())
}

async fn get(args: DraftGet, repositories_file: &Utf8Path, config: &OrchestratorConfig) -> anyhow::Result<()> {
    let store = repositories::store_from_file(repositories_file, &config.cache_directory)?;
    let mut id = PackageRevisionId::new(args.repository, args.package, args.workspace);
    if let Some(revision) = args.revision {
        id = id.published(revision);
    }
    let resources = store.open_revision(&id).await?;
    package_io::write_package(&args.out, &resources.package)?;
    println!("wrote {} files to {}", resources.package.files.len(), args.out);
    Ok(())
}
