//! Parses the `pipeline` stanza out of a package's `Kptfile`.

use indexmap::IndexMap;
use kpt_errors::{Error, ErrorKind};
use kpt_krm::Package;
use serde::Deserialize;
use serde_yaml::Value;

/// Where a function's config comes from: an inline map rendered as a
/// `ConfigMap`-shaped resource, or a pointer to another file in the package.
#[derive(Debug, Clone)]
pub enum FunctionConfig {
    Inline(IndexMap<String, String>),
    Path(String),
}

/// How a function is executed.
#[derive(Debug, Clone)]
pub enum FunctionRuntimeSpec {
    Image(String),
    Exec(String),
    Wasm(String),
}

#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub runtime: FunctionRuntimeSpec,
    pub config: Option<FunctionConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub mutators: Vec<FunctionSpec>,
    pub validators: Vec<FunctionSpec>,
}

#[derive(Debug, Deserialize)]
struct RawFunctionSpec {
    image: Option<String>,
    exec: Option<String>,
    wasm: Option<String>,
    #[serde(rename = "configMap")]
    config_map: Option<IndexMap<String, String>>,
    #[serde(rename = "configPath")]
    config_path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawPipeline {
    #[serde(default)]
    mutators: Vec<RawFunctionSpec>,
    #[serde(default)]
    validators: Vec<RawFunctionSpec>,
}

#[derive(Debug, Deserialize, Default)]
struct RawKptfile {
    pipeline: Option<RawPipeline>,
}

impl TryFrom<RawFunctionSpec> for FunctionSpec {
    type Error = Error;

    fn try_from(raw: RawFunctionSpec) -> Result<Self, Error> {
        let runtime = match (raw.image, raw.exec, raw.wasm) {
            (Some(image), None, None) => FunctionRuntimeSpec::Image(image),
            (None, Some(exec), None) => FunctionRuntimeSpec::Exec(exec),
            (None, None, Some(wasm)) => FunctionRuntimeSpec::Wasm(wasm),
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "pipeline function must set exactly one of image, exec, wasm",
                ))
            }
        };
        let config = match (raw.config_map, raw.config_path) {
            (Some(map), None) => Some(FunctionConfig::Inline(map)),
            (None, Some(path)) => Some(FunctionConfig::Path(path)),
            (None, None) => None,
            (Some(_), Some(_)) => {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "pipeline function cannot set both configMap and configPath",
                ))
            }
        };
        Ok(Self { runtime, config })
    }
}

/// Reads the `pipeline` stanza from the package's `Kptfile`. A package with
/// no manifest, or a manifest with no pipeline, has an empty pipeline: it
/// contributes its resources to render unchanged.
pub fn load_pipeline(package: &Package) -> Result<Pipeline, Error> {
    let Some(manifest) = package.manifest()? else {
        return Ok(Pipeline::default());
    };
    let raw: RawKptfile = serde_yaml::from_value(manifest.content.clone())
        .map_err(|e| Error::with_source(ErrorKind::InvalidInput, "Kptfile is malformed", e))?;
    let Some(raw_pipeline) = raw.pipeline else {
        return Ok(Pipeline::default());
    };
    let mutators = raw_pipeline
        .mutators
        .into_iter()
        .map(FunctionSpec::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let validators = raw_pipeline
        .validators
        .into_iter()
        .map(FunctionSpec::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Pipeline { mutators, validators })
}

/// Resolves a [`FunctionConfig`] into the KRM resource value passed as a
/// ResourceList's `functionConfig`.
pub fn resolve_config(package: &Package, config: &Option<FunctionConfig>) -> Result<Option<Value>, Error> {
    match config {
        None => Ok(None),
        Some(FunctionConfig::Inline(map)) => {
            let mut mapping = serde_yaml::Mapping::new();
            mapping.insert(Value::String("apiVersion".into()), Value::String("v1".into()));
            mapping.insert(Value::String("kind".into()), Value::String("ConfigMap".into()));
            let mut data = serde_yaml::Mapping::new();
            for (k, v) in map {
                data.insert(Value::String(k.clone()), Value::String(v.clone()));
            }
            mapping.insert(Value::String("data".into()), Value::Mapping(data));
            Ok(Some(Value::Mapping(mapping)))
        }
        Some(FunctionConfig::Path(path)) => {
            let raw = package.files.get(path).ok_or_else(|| {
                Error::new(ErrorKind::InvalidInput, format!("functionConfig path not found in package: {path}"))
            })?;
            let docs = kpt_krm::document::Document::parse_file(path, raw)?;
            Ok(docs.into_iter().next().map(|d| d.resource.content))
        }
    }
}
