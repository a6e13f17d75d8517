use std::time::Duration;

use async_trait::async_trait;
use camino::Utf8PathBuf;
use kpt_errors::{Error, ErrorKind};
use kpt_krm::ResourceList;
use wasmtime::{Config, Engine, Linker, Module, Store};
use wasmtime_wasi::pipe::{MemoryInputPipe, MemoryOutputPipe};
use wasmtime_wasi::preview1::{self, WasiP1Ctx};
use wasmtime_wasi::WasiCtxBuilder;

use super::FunctionRuntime;

/// Runs a function as a WASM module: a single exported entry point, no
/// filesystem or network preopens, same wire format on stdin/stdout.
pub struct WasmRuntime {
    engine: Engine,
    module_path: Utf8PathBuf,
}

impl WasmRuntime {
    pub fn new(module_path: impl Into<Utf8PathBuf>) -> Result<Self, Error> {
        let mut config = Config::new();
        config.async_support(true);
        let engine = Engine::new(&config)
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, "failed to initialize wasm engine", e))?;
        Ok(Self { engine, module_path: module_path.into() })
    }
}

#[async_trait]
impl FunctionRuntime for WasmRuntime {
    async fn run(&self, input: ResourceList, timeout: Duration) -> Result<ResourceList, Error> {
        tokio::time::timeout(timeout, self.run_once(input))
            .await
            .map_err(|_| Error::new(ErrorKind::FunctionFailed, format!("{} timed out after {timeout:?}", self.module_path)))?
    }
}

impl WasmRuntime {
    async fn run_once(&self, input: ResourceList) -> Result<ResourceList, Error> {
        let wire = input.to_wire()?;
        let module = Module::from_file(&self.engine, self.module_path.as_std_path())
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, format!("failed to load module {}", self.module_path), e))?;

        let stdin = MemoryInputPipe::new(wire.into_bytes());
        let stdout = MemoryOutputPipe::new(16 * 1024 * 1024);

        let wasi: WasiP1Ctx = WasiCtxBuilder::new()
            .stdin(stdin)
            .stdout(stdout.clone())
            .build_p1();

        let mut linker: Linker<WasiP1Ctx> = Linker::new(&self.engine);
        preview1::add_to_linker_async(&mut linker, |ctx| ctx)
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, "failed to wire WASI imports", e))?;

        let mut store = Store::new(&self.engine, wasi);
        let instance = linker
            .instantiate_async(&mut store, &module)
            .await
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, format!("failed to instantiate {}", self.module_path), e))?;
        let start = instance
            .get_typed_func::<(), ()>(&mut store, "_start")
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, format!("{} has no _start export", self.module_path), e))?;
        start
            .call_async(&mut store, ())
            .await
            .map_err(|e| Error::with_source(ErrorKind::FunctionFailed, format!("{} trapped", self.module_path), e))?;
        drop(store);

        let output = stdout.contents();
        ResourceList::from_wire(&String::from_utf8_lossy(&output))
    }
}
