//! Packs a [`Package`] into the single tar layer an OCI image carries its
//! resource tree in, and unpacks it back.

use std::io::Read as _;

use kpt_errors::{Error, ErrorKind};
use kpt_krm::Package;

pub const LAYER_MEDIA_TYPE: &str = "application/vnd.kpt.package.v1.tar";

pub fn pack(package: &Package) -> Result<Vec<u8>, Error> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, contents) in &package.files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .map_err(|e| Error::with_source(ErrorKind::Upstream, format!("failed to tar {path}"), e))?;
    }
    builder
        .into_inner()
        .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to finalize tar layer", e))
}

pub fn unpack(bytes: &[u8]) -> Result<Package, Error> {
    let mut archive = tar::Archive::new(bytes);
    let mut package = Package::new();
    let entries = archive
        .entries()
        .map_err(|e| Error::with_source(ErrorKind::InvalidInput, "malformed tar layer", e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::with_source(ErrorKind::InvalidInput, "malformed tar entry", e))?;
        let path = entry
            .path()
            .map_err(|e| Error::with_source(ErrorKind::InvalidInput, "malformed tar entry path", e))?
            .to_string_lossy()
            .into_owned();
        let mut contents = String::new();
        entry
            .read_to_string(&mut contents)
            .map_err(|e| Error::with_source(ErrorKind::InvalidInput, format!("non-UTF8 file in layer: {path}"), e))?;
        package.insert_file(path, contents)?;
    }
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_package_contents() {
        let mut package = Package::new();
        package.insert_file("Kptfile", "apiVersion: kpt.dev/v1\nkind: Kptfile\n").unwrap();
        package.insert_file("deployment.yaml", "apiVersion: v1\nkind: Namespace\n").unwrap();

        let bytes = pack(&package).unwrap();
        let unpacked = unpack(&bytes).unwrap();

        assert_eq!(unpacked.files.get("Kptfile"), package.files.get("Kptfile"));
        assert_eq!(unpacked.files.get("deployment.yaml"), package.files.get("deployment.yaml"));
    }
}
