//! Two-phase turn barrier between the coordinator and its agents
//!
//! Phase one: the coordinator releases every registered agent with a ticket
//! for the turn. Phase two: it collects exactly one report per released agent,
//! waiting no longer than the configured timeout. Tickets and reports carry an
//! epoch so a report that arrives after its turn was given up on is dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tankwar_core::{Intent, PlayerId, WorldModel};

pub type AgentId = usize;

/// Everything an agent needs to act on one turn
#[derive(Clone, Debug)]
pub struct TurnTicket {
    pub epoch: u64,
    pub round: u32,
    pub turn: u32,
    /// Player whose turn it is, if any
    pub actor: Option<PlayerId>,
    /// Read-only view taken after this turn's snapshot was applied
    pub world: Arc<WorldModel>,
}

#[derive(Debug)]
pub enum Signal {
    Proceed(TurnTicket),
    Stop,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnStatus {
    Done,
    /// The agent hit a fatal error and has left the game
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct TurnReport {
    pub agent: AgentId,
    pub epoch: u64,
    pub intents: Vec<Intent>,
    pub status: TurnStatus,
}

/// Agent side of the barrier
pub struct AgentPort {
    id: AgentId,
    gate: Receiver<Signal>,
    done: Sender<TurnReport>,
}

impl AgentPort {
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Block until released. `None` means stop: either an explicit signal or
    /// the coordinator went away.
    ///
    /// Tickets queued while the agent was busy are skipped in favour of the
    /// newest one; a queued stop wins over any ticket.
    pub fn wait(&self) -> Option<TurnTicket> {
        let mut latest = match self.gate.recv() {
            Ok(Signal::Proceed(ticket)) => ticket,
            Ok(Signal::Stop) | Err(_) => return None,
        };
        loop {
            match self.gate.try_recv() {
                Ok(Signal::Proceed(ticket)) => {
                    tracing::debug!(
                        "Agent {} skipping stale epoch {} for {}",
                        self.id,
                        latest.epoch,
                        ticket.epoch
                    );
                    latest = ticket;
                }
                Ok(Signal::Stop) => return None,
                Err(TryRecvError::Empty) => return Some(latest),
                Err(TryRecvError::Disconnected) => return None,
            }
        }
    }

    pub fn report(&self, epoch: u64, intents: Vec<Intent>, status: TurnStatus) {
        let report = TurnReport {
            agent: self.id,
            epoch,
            intents,
            status,
        };
        if self.done.send(report).is_err() {
            tracing::debug!("Agent {} reported after the coordinator left", self.id);
        }
    }
}

/// Reports gathered for one epoch
#[derive(Debug, Default)]
pub struct Collected {
    pub reports: Vec<TurnReport>,
    /// Agents that did not report before the deadline
    pub missing: Vec<AgentId>,
}

/// Coordinator side of the barrier
pub struct TurnBarrier {
    gates: BTreeMap<AgentId, Sender<Signal>>,
    done_tx: Sender<TurnReport>,
    done_rx: Receiver<TurnReport>,
    pending: BTreeSet<AgentId>,
    epoch: u64,
    next_id: AgentId,
    timeout: Duration,
}

impl TurnBarrier {
    pub fn new(timeout: Duration) -> Self {
        let (done_tx, done_rx) = mpsc::channel();
        Self {
            gates: BTreeMap::new(),
            done_tx,
            done_rx,
            pending: BTreeSet::new(),
            epoch: 0,
            next_id: 0,
            timeout,
        }
    }

    pub fn register(&mut self) -> AgentPort {
        let (gate_tx, gate_rx) = mpsc::channel();
        let id = self.next_id;
        self.next_id += 1;
        self.gates.insert(id, gate_tx);
        AgentPort {
            id,
            gate: gate_rx,
            done: self.done_tx.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Drop an agent from the roster; it is no longer released or waited for
    pub fn remove(&mut self, agent: AgentId) {
        self.gates.remove(&agent);
        self.pending.remove(&agent);
    }

    /// Open the gate for every registered agent. Returns the new epoch.
    pub fn release(
        &mut self,
        round: u32,
        turn: u32,
        actor: Option<PlayerId>,
        world: Arc<WorldModel>,
    ) -> u64 {
        self.epoch += 1;
        self.pending.clear();

        let mut gone = Vec::new();
        for (&id, gate) in &self.gates {
            let ticket = TurnTicket {
                epoch: self.epoch,
                round,
                turn,
                actor,
                world: Arc::clone(&world),
            };
            if gate.send(Signal::Proceed(ticket)).is_ok() {
                self.pending.insert(id);
            } else {
                gone.push(id);
            }
        }
        for id in gone {
            tracing::warn!("Agent {} is gone, dropping it from the roster", id);
            self.gates.remove(&id);
        }
        self.epoch
    }

    /// Wait for one report from every agent released in the current epoch
    pub fn collect(&mut self) -> Collected {
        let deadline = Instant::now() + self.timeout;
        let mut collected = Collected::default();

        while !self.pending.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.done_rx.recv_timeout(remaining) {
                Ok(report) if report.epoch != self.epoch => {
                    tracing::debug!(
                        "Discarding stale report from agent {} (epoch {}, now {})",
                        report.agent,
                        report.epoch,
                        self.epoch
                    );
                }
                Ok(report) => {
                    if !self.pending.remove(&report.agent) {
                        tracing::warn!("Duplicate report from agent {}", report.agent);
                        continue;
                    }
                    if let TurnStatus::Failed(reason) = &report.status {
                        tracing::error!("Agent {} failed: {}", report.agent, reason);
                        self.gates.remove(&report.agent);
                    }
                    collected.reports.push(report);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        collected.missing = std::mem::take(&mut self.pending).into_iter().collect();
        if !collected.missing.is_empty() {
            tracing::warn!(
                "Turn barrier timed out after {:?}, skipping agents {:?}",
                self.timeout,
                collected.missing
            );
        }
        collected
    }

    /// Tell every agent to shut down
    pub fn stop(&mut self) {
        for gate in self.gates.values() {
            let _ = gate.send(Signal::Stop);
        }
        self.gates.clear();
        self.pending.clear();
    }
}
