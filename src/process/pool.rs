//! Pools: several pending processes started together and waited on as a group.

use std::fmt;
use std::ops::Index;
use std::sync::{Arc, Mutex, PoisonError};

use super::error::ProcessError;
use super::factory::Factory;
use super::invoked::InvokedProcess;
use super::pending::{PendingProcess, ProcessCommand};
use super::result::{OutputKind, ProcessResult};

/// How a process is addressed within a pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolKey {
    /// Position among the processes added without a name.
    Index(usize),
    /// Name given with [`Pool::add_as`].
    Name(String),
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for PoolKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for PoolKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for PoolKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Pending processes to be started together.
#[derive(Debug)]
pub struct Pool {
    factory: Factory,
    pending: Vec<(PoolKey, PendingProcess)>,
    next_index: usize,
}

impl Pool {
    pub(crate) fn new(factory: Factory) -> Self {
        Self { factory, pending: Vec::new(), next_index: 0 }
    }

    /// Adds a process configured by `build`, keyed by its position.
    pub fn add<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(PendingProcess) -> PendingProcess,
    {
        let key = PoolKey::Index(self.next_index);
        self.next_index += 1;
        let process = build(self.factory.new_pending_process());
        self.pending.push((key, process));
        self
    }

    /// Adds a process configured by `build`, keyed by `name`.
    pub fn add_as<F>(&mut self, name: impl Into<String>, build: F) -> &mut Self
    where
        F: FnOnce(PendingProcess) -> PendingProcess,
    {
        let process = build(self.factory.new_pending_process());
        self.pending.push((PoolKey::Name(name.into()), process));
        self
    }

    /// Adds a process running `command`, keyed by its position.
    pub fn command(&mut self, command: impl Into<ProcessCommand>) -> &mut Self {
        let command = command.into();
        self.add(|process| process.command(command))
    }

    /// Number of processes in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Starts every process without waiting.
    ///
    /// # Errors
    ///
    /// Returns the first start failure; processes already started are killed.
    pub fn start(self) -> Result<InvokedProcessPool, ProcessError> {
        self.start_each(|_, process| process.start_unrecorded(None))
    }

    /// Starts every process, passing each output chunk with its pool key to
    /// `on_output`.
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start).
    pub fn start_with_output<O>(self, on_output: O) -> Result<InvokedProcessPool, ProcessError>
    where
        O: FnMut(&PoolKey, OutputKind, &str) + Send + 'static,
    {
        let on_output = Arc::new(Mutex::new(on_output));
        self.start_each(move |key, process| {
            let key = key.clone();
            let on_output = Arc::clone(&on_output);
            process.start_unrecorded(Some(Box::new(move |kind: OutputKind, chunk: &str| {
                let mut guard = on_output.lock().unwrap_or_else(PoisonError::into_inner);
                let callback = &mut *guard;
                callback(&key, kind, chunk);
            })))
        })
    }

    /// Fakes are recorded only once every member has started.
    fn start_each<S>(self, mut start: S) -> Result<InvokedProcessPool, ProcessError>
    where
        S: FnMut(&PoolKey, PendingProcess) -> Result<InvokedProcess, ProcessError>,
    {
        let mut processes: Vec<(PoolKey, InvokedProcess)> = Vec::with_capacity(self.pending.len());
        for (key, pending) in self.pending {
            match start(&key, pending) {
                Ok(process) => processes.push((key, process)),
                Err(err) => {
                    for (_, process) in &mut processes {
                        process.abort();
                    }
                    return Err(err);
                }
            }
        }
        for (_, process) in &mut processes {
            process.commit_record();
        }
        Ok(InvokedProcessPool { processes })
    }
}

/// A pool whose processes have all been started.
pub struct InvokedProcessPool {
    processes: Vec<(PoolKey, InvokedProcess)>,
}

impl InvokedProcessPool {
    /// Keys of the processes still running.
    pub fn running(&mut self) -> Vec<PoolKey> {
        self.processes
            .iter_mut()
            .filter_map(|(key, process)| process.running().then(|| key.clone()))
            .collect()
    }

    /// Number of processes in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Waits for every process, in the order they were added.
    ///
    /// # Errors
    ///
    /// Returns the first wait failure (such as a timeout); the remaining
    /// processes are killed.
    pub fn wait(self) -> Result<ProcessPoolResults, ProcessError> {
        let mut results = Vec::with_capacity(self.processes.len());
        let mut remaining = self.processes.into_iter();
        while let Some((key, process)) = remaining.next() {
            match process.wait() {
                Ok(result) => results.push((key, result)),
                Err(err) => {
                    for (_, mut process) in remaining {
                        process.abort();
                    }
                    return Err(err);
                }
            }
        }
        Ok(ProcessPoolResults { results })
    }
}

/// Results of a pool, addressable by position or name.
#[derive(Debug, Clone)]
pub struct ProcessPoolResults {
    results: Vec<(PoolKey, ProcessResult)>,
}

impl ProcessPoolResults {
    /// The result stored under `key`.
    pub fn get(&self, key: impl Into<PoolKey>) -> Option<&ProcessResult> {
        let key = key.into();
        self.results.iter().find(|(k, _)| *k == key).map(|(_, result)| result)
    }

    /// Whether every process succeeded.
    #[must_use]
    pub fn successful(&self) -> bool {
        self.results.iter().all(|(_, result)| result.successful())
    }

    /// Whether any process failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        !self.successful()
    }

    /// Number of results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether there are no results.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results with their keys, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&PoolKey, &ProcessResult)> {
        self.results.iter().map(|(key, result)| (key, result))
    }
}

impl IntoIterator for ProcessPoolResults {
    type Item = (PoolKey, ProcessResult);
    type IntoIter = std::vec::IntoIter<(PoolKey, ProcessResult)>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl Index<usize> for ProcessPoolResults {
    type Output = ProcessResult;

    fn index(&self, index: usize) -> &ProcessResult {
        self.get(index).unwrap_or_else(|| panic!("no process at pool index {index}"))
    }
}

impl Index<&str> for ProcessPoolResults {
    type Output = ProcessResult;

    fn index(&self, name: &str) -> &ProcessResult {
        self.get(name).unwrap_or_else(|| panic!("no process named {name:?} in pool"))
    }
}
