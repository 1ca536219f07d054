//! Port allocation.
//!
//! One allocator instance is owned by a single compile pass, so two
//! concurrent compiles can never interfere. All dynamically allocated
//! ports (pipeline services and model servers alike) come from one
//! monotonic counter, which makes global uniqueness within a topology
//! trivial; vector stores use their own well-known counter spaces.

/// First dynamically allocated port.
pub const DYNAMIC_PORT_BASE: u16 = 7000;

/// Data port of vector-store instance 0.
pub const VECTOR_DATA_PORT_BASE: u16 = 6379;

/// Inspection-UI port of vector-store instance 0.
pub const VECTOR_INSIGHT_PORT_BASE: u16 = 8001;

/// Hands out ports for one compile pass.
#[derive(Debug)]
pub struct PortAllocator {
    next_dynamic: u16,
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PortAllocator {
    pub fn new() -> Self {
        Self {
            next_dynamic: DYNAMIC_PORT_BASE,
        }
    }

    /// Next free dynamic port.
    pub fn next_dynamic(&mut self) -> u16 {
        let port = self.next_dynamic;
        self.next_dynamic += 1;
        port
    }

    /// Data port of vector-store instance `index`.
    pub fn vector_data(index: u16) -> u16 {
        VECTOR_DATA_PORT_BASE + index
    }

    /// Inspection port of vector-store instance `index`.
    pub fn vector_insight(index: u16) -> u16 {
        VECTOR_INSIGHT_PORT_BASE + index
    }
}
