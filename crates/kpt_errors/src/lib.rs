//! Error taxonomy, operation-context tracking, retry backoff, and the
//! event-stream types shared by every `kpt_*` crate.

mod error;
mod event;
pub mod retry;

pub use error::{Error, ErrorKind, OperationContext, Result};
pub use event::{Event, EventAction, EventGroup};
pub use retry::{retry, RetryConfig};
