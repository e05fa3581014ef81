//! Process execution with substitutable fakes and a recorded log for tests.
//!
//! [`Factory`] is the entry point. It hands out [`PendingProcess`] builders
//! that consult the factory's fake handlers before spawning anything, and
//! records every finished process while recording is on.

pub mod cassette;
pub mod error;
pub mod factory;
pub mod fake;
pub mod invoked;
pub mod pattern;
pub mod pending;
pub mod pool;
pub mod result;

pub use cassette::{Cassette, Interaction};
pub use error::ProcessError;
pub use factory::{Factory, RecordedProcess};
pub use fake::{
    FakeHandler, FakeHandlers, FakeOutput, FakeProcessDescription, FakeProcessResult,
    FakeProcessSequence, FakeResponse,
};
pub use invoked::InvokedProcess;
pub use pending::{PendingProcess, ProcessCommand, DEFAULT_TIMEOUT};
pub use pool::{InvokedProcessPool, Pool, PoolKey, ProcessPoolResults};
pub use result::{OutputKind, ProcessResult};
