use crate::error::CoreError;
use crate::session::Session;
use crate::state::FieldUpdate;
use crate::types::{Command, Side};
use log::{debug, error, info};
use std::collections::VecDeque;

/// Where a command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Participant {
    /// The authoritative actor itself.
    Host,
    /// A remote peer, by connection id.
    Peer(u32),
}

/// Single entry point for state-changing requests.
///
/// Requests are queued in arrival order and executed one at a time against
/// the session. Each accepted command yields one batch of committed writes;
/// a request that fails the authority or transition guard is dropped and
/// leaves no trace.
#[derive(Debug, Default)]
pub struct CommandRouter {
    guest: Option<u32>,
    inbox: VecDeque<(Participant, Command)>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives `peer` the Guest seat if it is free.
    pub fn seat(&mut self, peer: u32) -> Option<Side> {
        match self.guest {
            None => {
                self.guest = Some(peer);
                info!("Peer {} takes the {} seat", peer, Side::Guest);
                Some(Side::Guest)
            }
            Some(existing) if existing == peer => Some(Side::Guest),
            Some(_) => None,
        }
    }

    /// Frees the seat held by `peer`. Returns whether it held one.
    pub fn vacate(&mut self, peer: u32) -> bool {
        if self.guest == Some(peer) {
            self.guest = None;
            self.inbox.retain(|(from, _)| *from != Participant::Peer(peer));
            return true;
        }
        false
    }

    pub fn guest(&self) -> Option<u32> {
        self.guest
    }

    pub fn side_of(&self, participant: Participant) -> Option<Side> {
        match participant {
            Participant::Host => Some(Side::Home),
            Participant::Peer(id) if self.guest == Some(id) => Some(Side::Guest),
            Participant::Peer(_) => None,
        }
    }

    /// Whether `participant` may act for `side`. The host also plays any
    /// side nobody is seated at.
    pub fn controls(&self, participant: Participant, side: Side) -> bool {
        match (participant, side) {
            (Participant::Host, Side::Home) => true,
            (Participant::Host, Side::Guest) => self.guest.is_none(),
            (Participant::Peer(_), _) => self.side_of(participant) == Some(side),
        }
    }

    /// Queues a request. Nothing runs until [`CommandRouter::dispatch`].
    pub fn request_change(&mut self, from: Participant, command: Command) {
        self.inbox.push_back((from, command));
    }

    pub fn request_start(&mut self, from: Participant) {
        self.request_change(from, Command::Start);
    }

    pub fn request_serve(&mut self, from: Participant) {
        self.request_change(from, Command::Serve);
    }

    pub fn request_pause(&mut self, from: Participant) {
        self.request_change(from, Command::Pause);
    }

    pub fn request_resume(&mut self, from: Participant) {
        self.request_change(from, Command::Resume);
    }

    pub fn request_restart(&mut self, from: Participant) {
        self.request_change(from, Command::Restart);
    }

    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Runs every queued request in arrival order and returns one batch
    /// per command that changed something.
    pub fn dispatch(&mut self, session: &mut Session) -> Vec<Vec<FieldUpdate>> {
        let mut batches = Vec::new();
        while let Some((from, command)) = self.inbox.pop_front() {
            match self.execute(session, from, command) {
                Ok(batch) if !batch.is_empty() => batches.push(batch),
                Ok(_) => {}
                Err(err) if err.is_guard_failure() => {
                    debug!("Ignoring {} from {:?}: {}", command, from, err);
                }
                Err(err) => error!("{} from {:?} failed: {}", command, from, err),
            }
        }
        batches
    }

    /// Checks and runs one command, publishing its writes as a batch.
    pub fn execute(
        &self,
        session: &mut Session,
        from: Participant,
        command: Command,
    ) -> Result<Vec<FieldUpdate>, CoreError> {
        self.authorize(session, from, command)?;
        let result = match command {
            Command::Start => session.start(),
            Command::Serve => session.serve(),
            Command::Pause => session.pause(),
            Command::Resume => session.resume(),
            Command::Restart => session.restart(),
        };
        // Writes made before a failure still go out
        let batch = session.publish();
        result.map(|_| batch)
    }

    fn authorize(
        &self,
        session: &Session,
        from: Participant,
        command: Command,
    ) -> Result<(), CoreError> {
        if let Participant::Peer(_) = from {
            if self.side_of(from).is_none() {
                return Err(CoreError::NotAuthorized {
                    operation: "issue commands without a seat",
                });
            }
        }
        if command == Command::Serve && !self.controls(from, session.serve_side()) {
            return Err(CoreError::NotAuthorized {
                operation: "serve for the other side",
            });
        }
        Ok(())
    }
}
