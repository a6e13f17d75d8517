use camino::Utf8Path;
use kpt_krm::PackageRevisionId;
use kpt_porch_core::OrchestratorConfig;
use kpt_render::{DefaultResolver, RenderConfig};

use crate::cli::RenderArgs;
use crate::repositories;

pub async fn run(args: RenderArgs, repositories_file: &Utf8Path, config: &OrchestratorConfig) -> anyhow::Result<()> {
    let store = repositories::store_from_file(repositories_file, &config.cache_directory)?;
    let mut id = PackageRevisionId::new(args.repository, args.package, args.workspace);
    if let Some(revision) = args.revision {
        id = id.published(revision);
    }

    let docker = if args.docker { bollard::Docker::connect_with_local_defaults().ok() } else { None };
    let render_config = RenderConfig { default_network_policy: config.network_policy, ..RenderConfig::default() };
    let resolver = DefaultResolver { docker, config: render_config };

    let events = kpt_porch_core::command::render::render_revision(&store, &id, &resolver, &resolver.config).await?;
    for event in &events {
        println!("{event:?}");
    }
    Ok(())
}
