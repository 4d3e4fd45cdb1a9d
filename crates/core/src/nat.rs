//! Two-level NAT table (`spec.md` §4.4).
//!
//! Maps a 4-tuple `(peer_addr, peer_port, inner_addr, inner_port)` to a
//! relay-local port drawn from a fixed range, and back. The range is never
//! reported full: `add_entry` always reclaims whatever port the LRU says is
//! least recently used, silently dropping that port's previous flow.

use crate::error::NatError;
use crate::lru::Lru;
use std::collections::HashMap;

type Tuple = (String, u16, String, u16);

fn host_string(peer_addr: &str, peer_port: u16, inner_addr: &str, inner_port: u16) -> String {
    format!("{peer_addr}:{peer_port}:{inner_addr}:{inner_port}")
}

/// A bidirectional NAT table bounded to `[port_min, port_max]`.
pub struct NatTable {
    port_min: u16,
    lru: Lru,
    host_to_port: HashMap<String, u16>,
    port_to_host: HashMap<u16, Tuple>,
}

impl NatTable {
    /// Build a table over the inclusive port range `[port_min, port_max]`.
    pub fn new(port_min: u16, port_max: u16) -> Result<Self, NatError> {
        if port_max < port_min {
            return Err(NatError::RangeEmpty);
        }
        let size = (port_max - port_min) as usize + 1;
        Ok(Self {
            port_min,
            lru: Lru::new(size),
            host_to_port: HashMap::new(),
            port_to_host: HashMap::new(),
        })
    }

    fn port_for_slot(&self, slot: usize) -> u16 {
        self.port_min + slot as u16
    }

    fn slot_for_port(&self, port: u16) -> Option<usize> {
        if port < self.port_min {
            return None;
        }
        let slot = (port - self.port_min) as usize;
        if slot < self.lru.len() {
            Some(slot)
        } else {
            None
        }
    }

    /// Allocate (or reallocate) a local port for this 4-tuple, evicting
    /// whatever flow currently holds the least-recently-used slot.
    pub fn add_entry(
        &mut self,
        peer_addr: &str,
        peer_port: u16,
        inner_addr: &str,
        inner_port: u16,
    ) -> u16 {
        let slot = self.lru.evict_lru();
        let port = self.port_for_slot(slot);
        if let Some(evicted) = self.port_to_host.remove(&port) {
            let evicted_key = host_string(&evicted.0, evicted.1, &evicted.2, evicted.3);
            self.host_to_port.remove(&evicted_key);
        }
        let key = host_string(peer_addr, peer_port, inner_addr, inner_port);
        self.host_to_port.insert(key, port);
        self.port_to_host.insert(
            port,
            (peer_addr.to_string(), peer_port, inner_addr.to_string(), inner_port),
        );
        debug_assert_eq!(self.host_to_port.len(), self.port_to_host.len());
        port
    }

    /// Pure lookup; does not affect LRU order.
    pub fn query_port(
        &self,
        peer_addr: &str,
        peer_port: u16,
        inner_addr: &str,
        inner_port: u16,
    ) -> Option<u16> {
        let key = host_string(peer_addr, peer_port, inner_addr, inner_port);
        self.host_to_port.get(&key).copied()
    }

    /// Reverse lookup by local port. Touches the LRU: a live flow's slot
    /// survives as long as return traffic keeps arriving.
    pub fn query_host(&mut self, local_port: u16) -> Option<&Tuple> {
        let slot = self.slot_for_port(local_port)?;
        self.lru.touch(slot);
        self.port_to_host.get(&local_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_range_is_rejected() {
        assert!(matches!(NatTable::new(100, 99), Err(NatError::RangeEmpty)));
    }

    #[test]
    fn allocation_scenario_from_spec() {
        let mut nat = NatTable::new(60000, 60001).unwrap();

        let p1 = nat.add_entry("1.1.1.1", 1, "10.0.0.1", 1000);
        assert_eq!(p1, 60000);

        let p2 = nat.add_entry("2.2.2.2", 2, "10.0.0.2", 2000);
        assert_eq!(p2, 60001);

        let p3 = nat.add_entry("3.3.3.3", 3, "10.0.0.3", 3000);
        assert_eq!(p3, 60000);

        assert_eq!(nat.query_port("1.1.1.1", 1, "10.0.0.1", 1000), None);
        assert_eq!(nat.query_port("2.2.2.2", 2, "10.0.0.2", 2000), Some(60001));
        assert_eq!(nat.query_port("3.3.3.3", 3, "10.0.0.3", 3000), Some(60000));
    }

    #[test]
    fn query_host_touches_lru_and_keeps_flow_alive() {
        let mut nat = NatTable::new(60000, 60001).unwrap();
        nat.add_entry("1.1.1.1", 1, "10.0.0.1", 1000);
        nat.add_entry("2.2.2.2", 2, "10.0.0.2", 2000);

        // Without the touch, 60000 would be LRU tail and get evicted next.
        nat.query_host(60000);

        let p3 = nat.add_entry("3.3.3.3", 3, "10.0.0.3", 3000);
        assert_eq!(p3, 60001);
        assert_eq!(nat.query_port("1.1.1.1", 1, "10.0.0.1", 1000), Some(60000));
        assert_eq!(nat.query_port("2.2.2.2", 2, "10.0.0.2", 2000), None);
    }

    #[test]
    fn query_host_returns_reverse_tuple() {
        let mut nat = NatTable::new(60000, 60000).unwrap();
        nat.add_entry("1.1.1.1", 1, "10.0.0.1", 1000);
        assert_eq!(
            nat.query_host(60000),
            Some(&("1.1.1.1".to_string(), 1, "10.0.0.1".to_string(), 1000))
        );
    }

    #[test]
    fn query_host_out_of_range_port_is_none() {
        let mut nat = NatTable::new(60000, 60001).unwrap();
        assert_eq!(nat.query_host(1), None);
        assert_eq!(nat.query_host(70000), None);
    }

    #[test]
    fn single_port_range_always_evicts_the_one_slot() {
        let mut nat = NatTable::new(5000, 5000).unwrap();
        let p1 = nat.add_entry("1.1.1.1", 1, "10.0.0.1", 1000);
        let p2 = nat.add_entry("2.2.2.2", 2, "10.0.0.2", 2000);
        assert_eq!(p1, 5000);
        assert_eq!(p2, 5000);
        assert_eq!(nat.query_port("1.1.1.1", 1, "10.0.0.1", 1000), None);
        assert_eq!(nat.query_port("2.2.2.2", 2, "10.0.0.2", 2000), Some(5000));
    }

    proptest::proptest! {
        #[test]
        fn maps_stay_equal_length_after_arbitrary_allocations(
            flows in proptest::collection::vec(
                (1u16..=5, 1000u16..=1010),
                1..64,
            )
        ) {
            let mut nat = NatTable::new(60000, 60003).unwrap();
            for (peer_port, inner_port) in flows {
                nat.add_entry("1.1.1.1", peer_port, "10.0.0.1", inner_port);
            }
            proptest::prop_assert_eq!(nat.host_to_port.len(), nat.port_to_host.len());
        }
    }
}
