//! Reads/writes a [`kpt_krm::Package`] file map against a local directory,
//! the CLI's staging area for Draft content before it's pushed through a
//! repository driver.

use camino::Utf8Path;
use kpt_errors::{Error, ErrorKind};
use kpt_krm::Package;

pub fn read_package(dir: &Utf8Path) -> Result<Package, Error> {
    let mut package = Package::new();
    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry.map_err(|e| Error::with_source(ErrorKind::Upstream, format!("failed to walk {dir}"), e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to compute relative path", e))?;
        let Some(relative) = relative.to_str() else {
            continue;
        };
        let contents = fs_err::read_to_string(entry.path())
            .map_err(|e| Error::with_source(ErrorKind::Upstream, format!("failed to read {}", entry.path().display()), e))?;
        package.insert_file(relative.replace('\\', "/"), contents)?;
    }
    Ok(package)
}

pub fn write_package(dir: &Utf8Path, package: &Package) -> Result<(), Error> {
    for (path, contents) in &package.files {
        let full_path = dir.join(path);
        if let Some(parent) = full_path.parent() {
            fs_err::create_dir_all(parent)
                .map_err(|e| Error::with_source(ErrorKind::Upstream, format!("failed to create {parent}"), e))?;
        }
        fs_err::write(&full_path, contents)
            .map_err(|e| Error::with_source(ErrorKind::Upstream, format!("failed to write {full_path}"), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn write_then_read_round_trips_nested_files() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();

        let mut package = Package::new();
        package.insert_file("Kptfile", "apiVersion: kpt.dev/v1\n").unwrap();
        package.insert_file("configmap/deployment.yaml", "kind: ConfigMap\n").unwrap();

        write_package(&dir, &package).unwrap();
        let read_back = read_package(&dir).unwrap();

        assert_eq!(read_back.files.get("Kptfile"), package.files.get("Kptfile"));
        assert_eq!(
            read_back.files.get("configmap/deployment.yaml"),
            package.files.get("configmap/deployment.yaml"),
        );
    }

    #[test]
    fn read_package_of_empty_directory_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();

        let package = read_package(&dir).unwrap();
        assert!(package.files.is_empty());
    }
}
