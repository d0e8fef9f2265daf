use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use sdi_types::DiscoveredDevice;
use tracing::debug;

/**
    Where probed devices are recorded and stream ids come from.
*/
pub trait DeviceRegistry: Send + Sync {
    /// Allocate a stream id not handed out before by this registry.
    fn next_stream_id(&self) -> u32;

    fn register(&self, device: DiscoveredDevice);
}

/**
    In-memory registry of discovered devices, keyed by card index.
*/
#[derive(Debug, Default)]
pub struct DeviceList {
    devices: RwLock<BTreeMap<usize, DiscoveredDevice>>,
    next_stream_id: AtomicU32,
}

impl DeviceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, card_index: usize) -> Option<DiscoveredDevice> {
        self.devices.read().get(&card_index).cloned()
    }

    /// All registered devices, ordered by card index.
    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        self.devices.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}

impl DeviceRegistry for DeviceList {
    fn next_stream_id(&self) -> u32 {
        self.next_stream_id.fetch_add(1, Ordering::Relaxed)
    }

    /**
        Registering a card that is already present replaces its entry, so a
        re-probe reflects the card's current configuration.
    */
    fn register(&self, device: DiscoveredDevice) {
        let card_index = device.card_index;
        let replaced = self.devices.write().insert(card_index, device).is_some();
        debug!(card = card_index, replaced, "device registered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(card_index: usize, model: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            card_index,
            model_name: model.to_string(),
            streams: Vec::new(),
        }
    }

    #[test]
    fn stream_ids_are_sequential() {
        let list = DeviceList::new();
        assert_eq!(list.next_stream_id(), 0);
        assert_eq!(list.next_stream_id(), 1);
        assert_eq!(list.next_stream_id(), 2);
    }

    #[test]
    fn register_replaces_same_card() {
        let list = DeviceList::new();
        list.register(device(1, "first"));
        list.register(device(0, "other"));
        list.register(device(1, "second"));

        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).unwrap().model_name, "second");
        let order: Vec<usize> = list.devices().iter().map(|d| d.card_index).collect();
        assert_eq!(order, vec![0, 1]);
    }
}
