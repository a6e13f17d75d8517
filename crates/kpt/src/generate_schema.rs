use anyhow::Context;
use schemars::schema_for;
use std::path::Path;

use crate::repositories::RepositoriesFile;

const FOLDER: &str = ".schema";
const FILE: &str = "latest.json";

/// Generates the JSON schema of the repositories file, meant for
/// `SchemaStore`-based IDE completion.
pub fn generate_schema_to_disk() -> anyhow::Result<()> {
    let file_path = Path::new(FOLDER).join(FILE);
    let json = generate_schema_json().context("can't generate schema")?;
    fs_err::create_dir_all(FOLDER)?;
    fs_err::write(file_path, json).context("can't write schema")?;
    Ok(())
}

fn generate_schema_json() -> anyhow::Result<String> {
    let schema = schema_for!(RepositoriesFile);
    serde_json::to_string_pretty(&schema).context("can't convert schema to string")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_schema_describes_the_repositories_file_shape() {
        let json = generate_schema_json().unwrap();
        assert!(json.contains("\"repositories\""));
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_object());
    }
}
