//! Exécuteurs des invocations différées (one-way et asynchrones).
//!
//! Une [`UnitOfWork`] encapsule l'invocation et partage un [`TaskHandle`]
//! avec l'appelant, qui peut l'annuler tant qu'elle n'a pas démarré ou
//! attendre sa fin.
//!
//! Deux exécuteurs sont fournis :
//! - [`InlineExecutor`] exécute le travail sur le thread qui le soumet
//! - [`PooledExecutor`] le confie au pool de threads bloquants d'un runtime tokio
//!
//! Les exécuteurs sont regroupés par rôle dans un [`ExecutorRegistry`],
//! passé explicitement au dispatcher.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info};

use crate::config::ExecutorConfig;
use crate::errors::DispatchError;
use crate::failure::Failure;

/// Rôle de l'exécuteur partagé utilisé par le dispatcher serveur
pub const SERVER_EXECUTOR: &str = "server-dispatch";

/// État d'une tâche soumise
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    /// Terminée en échec, avec le message de la cause racine
    Failed(String),
    Cancelled,
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }
}

struct TaskState {
    status: Mutex<TaskStatus>,
    changed: Condvar,
}

/// Poignée partagée sur une tâche
#[derive(Clone)]
pub struct TaskHandle {
    state: Arc<TaskState>,
}

impl TaskHandle {
    fn with_status(status: TaskStatus) -> Self {
        Self {
            state: Arc::new(TaskState {
                status: Mutex::new(status),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn new() -> Self {
        Self::with_status(TaskStatus::Pending)
    }

    /// Poignée d'une tâche qui n'a jamais pu être soumise
    pub fn failed(message: impl Into<String>) -> Self {
        Self::with_status(TaskStatus::Failed(message.into()))
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status.lock().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.state.status.lock().is_finished()
    }

    /// Annule la tâche si elle n'a pas encore démarré.
    ///
    /// Retourne `false` si elle est déjà en cours ou terminée : une tâche
    /// démarrée n'est pas interrompue.
    pub fn cancel(&self) -> bool {
        let mut status = self.state.status.lock();
        if *status != TaskStatus::Pending {
            return false;
        }
        *status = TaskStatus::Cancelled;
        self.state.changed.notify_all();
        true
    }

    /// Attend la fin de la tâche au plus `timeout`, et retourne son état
    pub fn wait_timeout(&self, timeout: Duration) -> TaskStatus {
        let deadline = Instant::now() + timeout;
        let mut status = self.state.status.lock();
        while !status.is_finished() {
            if self
                .state
                .changed
                .wait_until(&mut status, deadline)
                .timed_out()
            {
                break;
            }
        }
        status.clone()
    }

    /// Pending → Running ; `false` si la tâche a été annulée
    fn begin(&self) -> bool {
        let mut status = self.state.status.lock();
        if *status != TaskStatus::Pending {
            return false;
        }
        *status = TaskStatus::Running;
        true
    }

    fn finish(&self, outcome: TaskStatus) {
        let mut status = self.state.status.lock();
        *status = outcome;
        self.state.changed.notify_all();
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("status", &self.status())
            .finish()
    }
}

type Job = Box<dyn FnOnce() -> Result<(), Failure> + Send + 'static>;

/// Travail différé et annulable
pub struct UnitOfWork {
    handle: TaskHandle,
    job: Job,
}

impl UnitOfWork {
    /// Crée une unité de travail.
    ///
    /// Le contexte nécessaire à l'invocation doit être capturé par `job`.
    pub fn new<F>(job: F) -> Self
    where
        F: FnOnce() -> Result<(), Failure> + Send + 'static,
    {
        Self {
            handle: TaskHandle::new(),
            job: Box::new(job),
        }
    }

    pub fn handle(&self) -> TaskHandle {
        self.handle.clone()
    }

    /// Exécute le travail, sauf s'il a été annulé.
    ///
    /// Un panic du travail est intercepté et enregistré comme un échec.
    pub fn run(self) {
        let UnitOfWork { handle, job } = self;

        if !handle.begin() {
            debug!("⏭️ Unit of work cancelled before execution");
            return;
        }

        let outcome = match catch_unwind(AssertUnwindSafe(job)) {
            Ok(Ok(())) => TaskStatus::Completed,
            Ok(Err(failure)) => TaskStatus::Failed(failure.message().to_string()),
            Err(panic) => TaskStatus::Failed(Failure::from_panic(panic).message().to_string()),
        };
        handle.finish(outcome);
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Abstraction d'exécution des unités de travail
pub trait Executor: Send + Sync + fmt::Debug {
    fn submit(&self, work: UnitOfWork);
}

/// Exécute le travail immédiatement, sur le thread appelant
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn submit(&self, work: UnitOfWork) {
        work.run();
    }
}

/// Exécute le travail sur le pool de threads bloquants d'un runtime tokio
pub struct PooledExecutor {
    handle: Handle,
    runtime: Option<Runtime>,
}

impl PooledExecutor {
    /// Crée un runtime dédié de `workers` threads
    pub fn new(workers: usize, thread_name: &str) -> std::io::Result<Self> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(workers)
            .thread_name(thread_name)
            .enable_all()
            .build()?;

        info!("✅ Dispatch executor started ({} workers)", workers);

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Utilise un runtime existant
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            runtime: None,
        }
    }

    /// Utilise le runtime tokio courant
    pub fn current() -> Result<Self, DispatchError> {
        Handle::try_current()
            .map(Self::from_handle)
            .map_err(|e| DispatchError::ExecutorUnavailable(e.to_string()))
    }
}

impl Executor for PooledExecutor {
    fn submit(&self, work: UnitOfWork) {
        self.handle.spawn_blocking(move || work.run());
    }
}

impl fmt::Debug for PooledExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledExecutor")
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}

impl Drop for PooledExecutor {
    fn drop(&mut self) {
        // Un Runtime ne peut pas être détruit depuis un contexte asynchrone
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Exécuteurs disponibles, par rôle
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: RwLock<HashMap<String, Arc<dyn Executor>>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registre dont l'exécuteur serveur est un pool construit selon `config`
    pub fn from_config(config: &ExecutorConfig) -> anyhow::Result<Self> {
        let executor = PooledExecutor::new(config.workers, &config.thread_name)?;
        let registry = Self::new();
        registry.register(SERVER_EXECUTOR, Arc::new(executor));
        Ok(registry)
    }

    /// Enregistre (ou remplace) l'exécuteur d'un rôle
    pub fn register(&self, role: impl Into<String>, executor: Arc<dyn Executor>) {
        let role = role.into();
        debug!("Registering executor for role '{}'", role);
        self.executors.write().insert(role, executor);
    }

    pub fn get(&self, role: &str) -> Option<Arc<dyn Executor>> {
        self.executors.read().get(role).cloned()
    }

    /// Exécuteur d'un rôle, ou [`DispatchError::ExecutorUnavailable`]
    pub fn require(&self, role: &str) -> Result<Arc<dyn Executor>, DispatchError> {
        self.get(role)
            .ok_or_else(|| DispatchError::ExecutorUnavailable(role.to_string()))
    }
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let executors = self.executors.read();
        let mut roles: Vec<&String> = executors.keys().collect();
        roles.sort();
        f.debug_struct("ExecutorRegistry")
            .field("roles", &roles)
            .finish()
    }
}
