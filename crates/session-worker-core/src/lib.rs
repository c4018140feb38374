//! Core of the session benchmark worker: sessions and their store, the result document and its
//! atomic writer, benchmark output parsing, model location and the polling policy.

pub mod lock;
pub mod locator;
pub mod observability;
pub mod parser;
pub mod policy;
pub mod result;
pub mod session;
pub mod store;
pub mod writer;

pub use lock::{LockError, WorkerLock};
pub use locator::{FsModelLocator, LocatorConfig, ModelLocator};
pub use observability::init_observability;
pub use policy::PollPolicy;
pub use result::{Metrics, ModelReference, ResultDocument, RunStatus};
pub use session::{Session, SessionState};
pub use store::{FsSessionStore, SessionStore, StoreError};
pub use writer::{AtomicJsonWriter, ResultWriter, WriteError};
