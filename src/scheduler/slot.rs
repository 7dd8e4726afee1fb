//! Single-flight production slot.

/// Proof that the slot is held for one segment index.
///
/// Not `Clone`: the only way to free the slot is to hand this back.
#[derive(Debug)]
#[must_use = "dropping a ticket leaves the slot held forever"]
pub struct ProductionTicket {
    index: u32,
}

impl ProductionTicket {
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// At most one segment production may be in flight.
#[derive(Debug, Default)]
pub struct ProductionSlot {
    held: Option<u32>,
}

impl ProductionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot for `index`, or `None` while another production runs.
    pub fn try_acquire(&mut self, index: u32) -> Option<ProductionTicket> {
        if self.held.is_some() {
            return None;
        }
        self.held = Some(index);
        Some(ProductionTicket { index })
    }

    /// Free the slot, returning the index the ticket was issued for.
    pub fn release(&mut self, ticket: ProductionTicket) -> u32 {
        debug_assert_eq!(self.held, Some(ticket.index));
        self.held = None;
        ticket.index
    }

    /// Index currently being produced.
    pub fn in_flight(&self) -> Option<u32> {
        self.held
    }

    pub fn is_busy(&self) -> bool {
        self.held.is_some()
    }
}
