use std::collections::HashMap;

use oci_distribution::secrets::RegistryAuth;

use crate::cli::{FunctionCommand, FunctionDiscover};

pub async fn run(command: FunctionCommand) -> anyhow::Result<()> {
    match command {
        FunctionCommand::Discover(args) => discover(args).await,
    }
}

async fn discover(args: FunctionDiscover) -> anyhow::Result<()> {
    let auth = match (args.username, args.password) {
        (Some(username), Some(password)) => RegistryAuth::Basic(username, password),
        _ => RegistryAuth::Anonymous,
    };
    let metadata = HashMap::new();
    let catalog = kpt_porch_core::FunctionCatalog::discover(&args.registry, &args.repository, &auth, &metadata).await?;

    let functions = match &args.keyword {
        Some(keyword) => catalog.find_by_keyword(keyword),
        None => catalog.all().iter().collect(),
    };
    for function in functions {
        println!("{}\t{}", function.image, function.keywords.join(","));
    }
    Ok(())
}
