/// Queue sizes the hub and its clients are built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Capacity of the hub's broadcast queue.
    pub broadcast_capacity: usize,
    /// Capacity of the hub's register and unregister queues.
    pub membership_capacity: usize,
    /// Capacity of each client's outbound queue. A member whose queue is full
    /// misses the message instead of stalling the hub.
    pub outbound_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 5,
            membership_capacity: 1,
            outbound_capacity: 10,
        }
    }
}

impl RelayConfig {
    /// Raises every capacity to at least one; tokio channels cannot be
    /// created with zero slots.
    pub fn normalized(self) -> Self {
        Self {
            broadcast_capacity: self.broadcast_capacity.max(1),
            membership_capacity: self.membership_capacity.max(1),
            outbound_capacity: self.outbound_capacity.max(1),
        }
    }
}
