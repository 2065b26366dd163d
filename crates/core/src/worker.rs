//! The single background thread all model and action code runs on.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use shared::protocol::{AbstractRequest, AbstractResponse};

use crate::{
    action::crud::register_crud_actions,
    error::WorkerError,
    naming::NamingContext,
    runner::{cancel_run, ActionRunner},
};

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub queue_capacity: usize,
    pub thread_name: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name: "model-worker".to_string(),
        }
    }
}

enum WorkerCommand {
    Request(AbstractRequest),
    Shutdown,
}

pub struct Worker;

impl Worker {
    /// Start the worker thread. Requests go through a bounded queue; the
    /// response channel is unbounded so no `ActionStopped` is ever dropped.
    pub fn spawn(
        root: Arc<NamingContext>,
        settings: WorkerSettings,
    ) -> Result<WorkerHandle, WorkerError> {
        let (request_tx, request_rx) = bounded(settings.queue_capacity.max(1));
        let (response_tx, response_rx) = unbounded();
        let runner = ActionRunner::new(root.clone(), response_tx.clone());
        let thread = thread::Builder::new()
            .name(settings.thread_name)
            .spawn(move || run_worker(runner, request_rx, response_tx))?;
        Ok(WorkerHandle {
            root,
            requests: request_tx,
            responses: response_rx,
            thread: Some(thread),
        })
    }
}

fn run_worker(
    runner: ActionRunner,
    requests: Receiver<WorkerCommand>,
    responses: Sender<AbstractResponse>,
) {
    if let Err(err) = register_crud_actions(runner.root()) {
        tracing::error!("cannot register table actions: {err}");
    }
    tracing::info!("model worker ready");
    let busy = |busy: bool| {
        let _ = responses.send(AbstractResponse::Busy { busy });
    };
    'outer: while let Ok(command) = requests.recv() {
        let WorkerCommand::Request(request) = command else {
            break;
        };
        busy(true);
        runner.handle(request);
        while let Ok(command) = requests.try_recv() {
            match command {
                WorkerCommand::Request(request) => runner.handle(request),
                WorkerCommand::Shutdown => {
                    busy(false);
                    break 'outer;
                }
            }
        }
        busy(false);
    }
    tracing::info!("model worker stopped");
}

/// UI-side handle of a running worker.
pub struct WorkerHandle {
    root: Arc<NamingContext>,
    requests: Sender<WorkerCommand>,
    responses: Receiver<AbstractResponse>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn root(&self) -> &Arc<NamingContext> {
        &self.root
    }

    pub fn responses(&self) -> &Receiver<AbstractResponse> {
        &self.responses
    }

    /// Queue `request`. A cancel flag is raised right away so a run that is
    /// busy pumping notices it before the request is dequeued.
    pub fn post(&self, request: AbstractRequest) -> Result<(), WorkerError> {
        let request_type = request.request_type();
        if let AbstractRequest::CancelAction { run_name } = &request {
            cancel_run(&self.root, run_name);
        }
        match self.requests.try_send(WorkerCommand::Request(request)) {
            Ok(()) => {
                tracing::debug!(request = request_type, "queued ui->worker request");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(request = request_type, "ui->worker request queue is full");
                Err(WorkerError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::error!(request = request_type, "ui->worker request queue disconnected");
                Err(WorkerError::Disconnected)
            }
        }
    }

    /// Queue a serialized request.
    pub fn post_bytes(&self, bytes: &[u8]) -> Result<(), WorkerError> {
        self.post(AbstractRequest::from_bytes(bytes)?)
    }

    /// Stop after the queued requests and wait for the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.requests.send(WorkerCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("model worker panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "tests/worker_tests.rs"]
mod tests;
