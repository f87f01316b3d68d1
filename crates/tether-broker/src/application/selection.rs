//! Selection policy: which device an unpreferenced controller joins.
//!
//! A controller that names no `preferred_device` is assigned the first
//! device found without a controller; when every device is controlled, the
//! one with the shortest waiting queue wins, ties going to the first
//! encountered during the scan.  Iteration order is not contractual, only
//! consistent within one call.

use tether_core::DeviceId;

use crate::application::registry::Registry;

/// Picks a device for a controller with no preference.
///
/// Returns `None` only when the registry holds zero device records.
pub fn choose_device(registry: &Registry) -> Option<DeviceId> {
    let mut shortest: Option<(&DeviceId, usize)> = None;

    for (id, record) in registry.iter() {
        if record.controller.is_none() {
            return Some(id.clone());
        }
        let depth = record.queue.len();
        if shortest.map_or(true, |(_, best)| depth < best) {
            shortest = Some((id, depth));
        }
    }

    shortest.map(|(id, _)| id.clone())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handle::PeerHandle;
    use tokio::sync::mpsc;

    fn make_handle() -> PeerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        std::mem::forget(rx);
        PeerHandle::new(tx)
    }

    fn register(reg: &mut Registry, id: &str, controllers: usize) {
        reg.register_device(id, make_handle());
        for _ in 0..controllers {
            reg.grant(id, make_handle());
        }
    }

    #[test]
    fn test_empty_registry_yields_none() {
        assert_eq!(choose_device(&Registry::new()), None);
    }

    #[test]
    fn test_uncontrolled_device_wins_over_shorter_queue() {
        let mut reg = Registry::new();
        // d1: controller + 2 queued, d2: free.
        register(&mut reg, "d1", 3);
        register(&mut reg, "d2", 0);
        assert_eq!(choose_device(&reg).as_deref(), Some("d2"));
    }

    #[test]
    fn test_shortest_queue_wins_when_all_devices_controlled() {
        let mut reg = Registry::new();
        register(&mut reg, "d1", 3); // queue depth 2
        register(&mut reg, "d2", 1); // queue depth 0
        assert_eq!(choose_device(&reg).as_deref(), Some("d2"));
    }

    #[test]
    fn test_tie_yields_one_of_the_tied_devices() {
        let mut reg = Registry::new();
        register(&mut reg, "d1", 2);
        register(&mut reg, "d2", 2);
        let chosen = choose_device(&reg).expect("non-empty registry must select");
        assert!(chosen == "d1" || chosen == "d2");
    }

    #[test]
    fn test_offline_device_without_controller_is_still_selectable() {
        // A record can outlive its device connection while controllers wait;
        // a record whose controller slot frees up meanwhile is a valid pick.
        let mut reg = Registry::new();
        register(&mut reg, "d1", 1);
        reg.register_device("d2", make_handle());
        let waiting = make_handle();
        reg.grant("d2", waiting.clone());
        reg.disconnect_device("d2");
        reg.remove_controller("d2", waiting.id());
        // d2's record is gone entirely now, so d1 is the only candidate.
        assert_eq!(choose_device(&reg).as_deref(), Some("d1"));
    }
}
