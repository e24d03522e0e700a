// Per-handle table of buffers handed to the caller, keyed by the address the caller sees.

use std::any::Any;
use std::collections::HashMap;

use super::records::CStrings;

/// A buffer the caller holds: the records plus the strings they point into.
struct Allocation {
    _records: Box<dyn Any>,
    _strings: CStrings,
}

#[derive(Default)]
pub struct Ledger {
    entries: HashMap<usize, Allocation>,
}

impl Ledger {
    /// Takes ownership of `records` (already boxed so `addr` is stable) until released.
    pub fn record<T: 'static>(&mut self, addr: usize, records: Box<T>, strings: CStrings) {
        let previous = self.entries.insert(
            addr,
            Allocation {
                _records: records,
                _strings: strings,
            },
        );
        if previous.is_some() {
            // Two live heap allocations cannot share an address.
            tracing::error!(addr, "ledger address reused while still outstanding");
        }
    }

    /// Frees the allocation at `addr`. False if it is unknown or was already released.
    pub fn release(&mut self, addr: usize) -> bool {
        self.entries.remove(&addr).is_some()
    }

    pub fn outstanding(&self) -> usize {
        self.entries.len()
    }
}
