//! The three function runtimes (container, exec, wasm) behind one trait, so
//! the pipeline executor in [`crate::pipeline`] is runtime-agnostic.

mod container;
mod exec;
mod wasm;

pub use container::ContainerRuntime;
pub use exec::ExecRuntime;
pub use wasm::WasmRuntime;

use std::time::Duration;

use async_trait::async_trait;
use kpt_errors::Error;
use kpt_krm::ResourceList;

/// A function's declared network policy, defaulting per
/// [`crate::config::RenderConfig`] but overridable per function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPolicy {
    None,
    Host,
}

#[async_trait]
pub trait FunctionRuntime: Send + Sync {
    async fn run(&self, input: ResourceList, timeout: Duration) -> Result<ResourceList, Error>;
}
