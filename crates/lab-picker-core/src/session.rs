//! Async driver for one picker instance.
//!
//! The session task owns the [`PickerViewModel`]. Keystrokes and selection
//! changes arrive as commands, the debounce deadline becomes a timer, and
//! catalog fetches are polled on the same task, so every state change happens
//! in one place, one event at a time.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, Instrument};

use crate::catalog::{CatalogResult, CatalogSource};
use crate::config::PickerConfig;
use crate::models::{AssociationStub, CatalogFilters, CatalogPage, CatalogQuery, TestId};
use crate::picker::{PickerProps, PickerSnapshot, PickerViewModel, SelectionListener};
use crate::selection::SelectionSet;

/// Session errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("Picker session has ended")]
    Closed,
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Messages from the UI to the session task.
#[derive(Debug, Clone, PartialEq)]
pub enum PickerCommand {
    Input(String),
    SetFilters(CatalogFilters),
    Toggle(TestId),
    Add(TestId),
    Remove(TestId),
    Retry,
    SetSelection(SelectionSet),
    SetExisting(Vec<AssociationStub>),
    Shutdown,
}

type Fetch = BoxFuture<'static, (CatalogQuery, CatalogResult<CatalogPage>)>;

/// Entry point for running a picker.
pub struct PickerSession;

impl PickerSession {
    /// Spawn the session task on the current tokio runtime.
    pub fn spawn<S, L>(source: Arc<S>, config: &PickerConfig, props: PickerProps, listener: L) -> PickerHandle
    where
        S: CatalogSource + 'static,
        L: SelectionListener + 'static,
    {
        let vm = PickerViewModel::new(config, props).with_listener(listener);
        let (commands, inbox) = mpsc::unbounded_channel();
        let (publisher, snapshots) = watch::channel(vm.snapshot());

        let session_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("picker_session", session = %session_id);
        let task = tokio::spawn(run(vm, source, inbox, publisher).instrument(span));

        PickerHandle {
            commands,
            snapshots,
            task,
        }
    }
}

/// Handle to a running session. Dropping it ends the session.
#[derive(Debug)]
pub struct PickerHandle {
    commands: mpsc::UnboundedSender<PickerCommand>,
    snapshots: watch::Receiver<PickerSnapshot>,
    task: JoinHandle<SelectionSet>,
}

impl PickerHandle {
    pub fn send(&self, command: PickerCommand) -> SessionResult<()> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }

    pub fn set_term(&self, term: impl Into<String>) -> SessionResult<()> {
        self.send(PickerCommand::Input(term.into()))
    }

    pub fn set_filters(&self, filters: CatalogFilters) -> SessionResult<()> {
        self.send(PickerCommand::SetFilters(filters))
    }

    pub fn toggle(&self, id: TestId) -> SessionResult<()> {
        self.send(PickerCommand::Toggle(id))
    }

    pub fn add(&self, id: TestId) -> SessionResult<()> {
        self.send(PickerCommand::Add(id))
    }

    pub fn remove(&self, id: TestId) -> SessionResult<()> {
        self.send(PickerCommand::Remove(id))
    }

    pub fn retry(&self) -> SessionResult<()> {
        self.send(PickerCommand::Retry)
    }

    pub fn set_selection(&self, selection: SelectionSet) -> SessionResult<()> {
        self.send(PickerCommand::SetSelection(selection))
    }

    pub fn set_existing(&self, existing: Vec<AssociationStub>) -> SessionResult<()> {
        self.send(PickerCommand::SetExisting(existing))
    }

    /// Latest published view state.
    pub fn snapshot(&self) -> PickerSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that wakes on every published view state.
    pub fn subscribe(&self) -> watch::Receiver<PickerSnapshot> {
        self.snapshots.clone()
    }

    /// Stop the session and wait for it. Returns the final selection.
    pub async fn shutdown(self) -> SessionResult<SelectionSet> {
        // The task may already be gone; joining still reports its result
        let _ = self.commands.send(PickerCommand::Shutdown);
        self.task.await.map_err(|_| SessionError::Closed)
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

fn fetch<S: CatalogSource + 'static>(source: &Arc<S>, query: CatalogQuery) -> Fetch {
    let source = Arc::clone(source);
    Box::pin(async move {
        let result = source.fetch(&query).await;
        (query, result)
    })
}

fn apply_command(vm: &mut PickerViewModel, command: PickerCommand) -> Option<CatalogQuery> {
    match command {
        PickerCommand::Input(term) => {
            vm.input(term, now());
            None
        }
        PickerCommand::SetFilters(filters) => vm.set_filters(filters, now()),
        PickerCommand::Retry => vm.retry(now()),
        PickerCommand::Toggle(id) => {
            vm.toggle(id);
            None
        }
        PickerCommand::Add(id) => {
            vm.add(id);
            None
        }
        PickerCommand::Remove(id) => {
            vm.remove(id);
            None
        }
        PickerCommand::SetSelection(selection) => {
            vm.set_selection(selection);
            None
        }
        PickerCommand::SetExisting(existing) => {
            vm.set_existing(existing);
            None
        }
        PickerCommand::Shutdown => None,
    }
}

async fn run<S: CatalogSource + 'static>(
    mut vm: PickerViewModel,
    source: Arc<S>,
    mut inbox: mpsc::UnboundedReceiver<PickerCommand>,
    publisher: watch::Sender<PickerSnapshot>,
) -> SelectionSet {
    info!("picker session started");
    let mut in_flight: FuturesUnordered<Fetch> = FuturesUnordered::new();

    if let Some(query) = vm.activate(now()) {
        in_flight.push(fetch(&source, query));
    }
    publisher.send_replace(vm.snapshot());

    loop {
        let deadline = vm.settle_deadline();
        let timer = tokio::time::sleep_until(deadline.map(Instant::from_std).unwrap_or_else(Instant::now));

        tokio::select! {
            command = inbox.recv() => {
                let command = match command {
                    Some(PickerCommand::Shutdown) | None => break,
                    Some(command) => command,
                };
                if let Some(query) = apply_command(&mut vm, command) {
                    in_flight.push(fetch(&source, query));
                }
            }
            _ = timer, if deadline.is_some() => {
                if let Some(query) = vm.poll(now()) {
                    in_flight.push(fetch(&source, query));
                }
            }
            Some((query, result)) = in_flight.next(), if !in_flight.is_empty() => {
                let outcome = vm.apply_response(query, result, now());
                debug!(?outcome, "catalog response handled");
            }
        }

        publisher.send_replace(vm.snapshot());
    }

    vm.deactivate();
    if !in_flight.is_empty() {
        debug!(pending = in_flight.len(), "dropping in-flight catalog fetches");
    }
    info!("picker session stopped");
    vm.selection().clone()
}
