use camino::Utf8Path;
use kpt_krm::PackageRevisionId;
use kpt_porch_core::{OrchestratorConfig, PackageRevisionStore};

use crate::cli::{RevisionCommand, RevisionList, RevisionRef};
use crate::repositories;

pub async fn run(command: RevisionCommand, repositories_file: &Utf8Path, config: &OrchestratorConfig) -> anyhow::Result<()> {
    let store = repositories::store_from_file(repositories_file, &config.cache_directory)?;
    match command {
        RevisionCommand::List(args) => list(&store, args).await,
        RevisionCommand::Propose(args) => {
            let metadata = store.propose(&revision_id(&args)).await?;
            report(&metadata)
        }
        RevisionCommand::Reject(args) => {
            let metadata = store.reject(&revision_id(&args)).await?;
            report(&metadata)
        }
        RevisionCommand::ProposeDelete(args) => {
            let metadata = store.propose_delete(&revision_id(&args)).await?;
            report(&metadata)
        }
        RevisionCommand::RejectDelete(args) => {
            let metadata = store.reject_delete(&revision_id(&args)).await?;
            report(&metadata)
        }
        RevisionCommand::Approve(args) => {
            let metadata = store.approve(&revision_id(&args)).await?;
            report(&metadata)
        }
        RevisionCommand::ApproveDelete(args) => approve_delete(&store, args).await,
    }
}

async fn list(store: &PackageRevisionStore, args: RevisionList) -> anyhow::Result<()> {
    let revisions = store.list_revisions(&args.repository).await?;
    for revision in &revisions {
        println!(
            "{}/{}/{} lifecycle={:?} latest={} tasks={}",
            revision.id.package_name,
            revision.id.workspace_name,
            revision.id.revision.as_deref().unwrap_or("-"),
            revision.lifecycle,
            revision.latest,
            revision.tasks.len()
        );
    }
    Ok(())
}

fn revision_id(args: &RevisionRef) -> PackageRevisionId {
    let id = PackageRevisionId::new(args.repository.clone(), args.package.clone(), args.workspace.clone());
    match &args.revision {
        Some(revision) => id.published(revision.clone()),
        None => id,
    }
}

fn report(metadata: &kpt_krm::PackageRevisionMetadata) -> anyhow::Result<()> {
    println!("{:?} now {:?}", metadata.id, metadata.lifecycle);
    Ok(())
}

async fn approve_delete(store: &PackageRevisionStore, args: RevisionRef) -> anyhow::Result<()> {
    let id = revision_id(&args);
    store.approve_delete(&id).await?;
    println!("{id:?} deleted");
    Ok(())
}
