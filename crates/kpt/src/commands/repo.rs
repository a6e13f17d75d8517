use camino::Utf8Path;

use crate::cli::{RepoAdd, RepoCommand, RepoRemove};
use crate::repositories::{ContentKindConfig, RepositoriesFile, RepositoryConfigEntry, RepositoryKindConfig};

pub fn run(command: RepoCommand, repositories_file: &Utf8Path) -> anyhow::Result<()> {
    match command {
        RepoCommand::Add(args) => add(args, repositories_file),
        RepoCommand::Remove(args) => remove(args, repositories_file),
        RepoCommand::List => list(repositories_file),
    }
}

fn add(args: RepoAdd, repositories_file: &Utf8Path) -> anyhow::Result<()> {
    let mut file = RepositoriesFile::load(repositories_file)?;
    anyhow::ensure!(
        !file.repositories.iter().any(|r| r.name == args.name),
        "repository {} is already registered",
        args.name
    );

    let kind = match args.kind {
        crate::cli::RepoKind::Git => RepositoryKindConfig::Git,
        crate::cli::RepoKind::Oci => RepositoryKindConfig::Oci,
    };
    let content = match args.content {
        crate::cli::ContentKindArg::Package => ContentKindConfig::Package,
        crate::cli::ContentKindArg::Function => ContentKindConfig::Function,
    };
    if matches!(kind, RepositoryKindConfig::Git) {
        anyhow::ensure!(args.url.is_some(), "--url is required for --kind git");
    } else {
        anyhow::ensure!(args.registry.is_some() && args.repository.is_some(), "--registry and --repository are required for --kind oci");
    }

    file.repositories.push(RepositoryConfigEntry {
        name: args.name.clone(),
        kind,
        content,
        url: args.url,
        registry: args.registry,
        repository: args.repository,
        deployment: args.deployment,
        description: args.description,
    });
    file.save(repositories_file)?;
    println!("registered repository {}", args.name);
    Ok(())
}

fn remove(args: RepoRemove, repositories_file: &Utf8Path) -> anyhow::Result<()> {
    let mut file = RepositoriesFile::load(repositories_file)?;
    let before = file.repositories.len();
    file.repositories.retain(|r| r.name != args.name);
    anyhow::ensure!(file.repositories.len() < before, "repository {} is not registered", args.name);
    file.save(repositories_file)?;
    println!("deregistered repository {}", args.name);
    Ok(())
}

fn list(repositories_file: &Utf8Path) -> anyhow::Result<()> {
    let file = RepositoriesFile::load(repositories_file)?;
    for repo in &file.repositories {
        println!(
            "{}\t{:?}\t{:?}\tdeployment={}\t{}",
            repo.name, repo.kind, repo.content, repo.deployment, repo.description
        );
    }
    Ok(())
}
