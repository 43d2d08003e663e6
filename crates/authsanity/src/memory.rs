//! In-memory verification backend.

use std::sync::Arc;

use authsanity_api::{Error, Principal, Result, Ticket, Verification, VerificationService};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Known principals, their groups, and the tickets issued to them.
///
/// Shared by all requests; hand each request its own
/// [`MemoryVerifier`] via [`MemoryTicketStore::verifier`].
#[derive(Debug, Default)]
pub struct MemoryTicketStore {
    principals: DashMap<Principal, Vec<String>>,
    tickets: DashMap<Ticket, Principal>,
}

impl MemoryTicketStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a principal that tickets may be issued to.
    pub fn add_principal<I, S>(&self, principal: impl Into<Principal>, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.principals
            .insert(principal.into(), groups.into_iter().map(Into::into).collect());
    }

    pub fn has_ticket(&self, ticket: &str) -> bool {
        self.tickets.contains_key(ticket)
    }

    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }

    /// A verifier bound to one request.
    pub fn verifier(self: &Arc<Self>) -> MemoryVerifier {
        MemoryVerifier {
            store: Arc::clone(self),
            state: Verification::Unverified,
        }
    }
}

/// Per-request view of a [`MemoryTicketStore`].
#[derive(Debug)]
pub struct MemoryVerifier {
    store: Arc<MemoryTicketStore>,
    state: Verification,
}

impl VerificationService for MemoryVerifier {
    fn userid(&self) -> Result<Verification> {
        Ok(self.state.clone())
    }

    fn groups(&self) -> Result<Vec<String>> {
        let Verification::Verified(Some(principal)) = &self.state else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .principals
            .get(principal)
            .map(|g| g.value().clone())
            .unwrap_or_default())
    }

    fn verify_ticket(&mut self, principal: Option<&str>, ticket: Option<&str>) -> Result<()> {
        let verified = match (principal, ticket) {
            (Some(principal), Some(ticket)) => self
                .store
                .tickets
                .get(ticket)
                .is_some_and(|owner| owner.value() == principal)
                .then(|| principal.to_string()),
            _ => None,
        };
        self.state = Verification::Verified(verified);
        Ok(())
    }

    fn add_ticket(&mut self, principal: &str, ticket: &str) -> Result<()> {
        if !self.store.principals.contains_key(principal) {
            return Err(Error::Validation(format!("unknown principal: {principal}")));
        }

        match self.store.tickets.entry(ticket.to_string()) {
            Entry::Occupied(e) if e.get() != principal => Err(Error::Validation(
                "ticket already issued to another principal".to_string(),
            )),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(e) => {
                e.insert(principal.to_string());
                Ok(())
            }
        }
    }

    fn remove_ticket(&mut self, ticket: Option<&str>) -> Result<()> {
        if let Some(ticket) = ticket {
            self.store.tickets.remove(ticket);
        }
        Ok(())
    }
}
