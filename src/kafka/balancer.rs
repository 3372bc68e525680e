use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
struct PartitionLoad {
    pending: u64,
    written: u64,
}

type Loads = HashMap<String, Vec<PartitionLoad>>;

/// Picks the partition with the fewest bytes still awaiting acknowledgment.
///
/// Ties go to the partition that has been written the least overall, then
/// to the lowest index, so sequential traffic still spreads out.
#[derive(Debug, Default, Clone)]
pub struct LeastBytesBalancer {
    loads: Arc<Mutex<Loads>>,
}

/// A reserved slot on one partition. Dropping it releases the pending bytes.
#[derive(Debug)]
pub struct PartitionLease {
    loads: Arc<Mutex<Loads>>,
    topic: String,
    partition: i32,
    bytes: u64,
}

impl LeastBytesBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` when the topic has no partitions.
    pub fn acquire(&self, topic: &str, partitions: usize, bytes: usize) -> Option<PartitionLease> {
        if partitions == 0 {
            return None;
        }
        let bytes = bytes as u64;
        let mut loads = self.loads.lock();
        let topic_loads = loads.entry(topic.to_string()).or_default();
        if topic_loads.len() < partitions {
            topic_loads.resize(partitions, PartitionLoad::default());
        }

        let (index, load) = topic_loads[..partitions]
            .iter_mut()
            .enumerate()
            .min_by_key(|(i, load)| (load.pending, load.written, *i))?;
        load.pending += bytes;
        load.written += bytes;

        Some(PartitionLease {
            loads: Arc::clone(&self.loads),
            topic: topic.to_string(),
            partition: index as i32,
            bytes,
        })
    }

    #[cfg(test)]
    pub fn pending_bytes(&self, topic: &str, partition: i32) -> u64 {
        self.loads
            .lock()
            .get(topic)
            .and_then(|loads| loads.get(partition as usize))
            .map_or(0, |load| load.pending)
    }
}

impl PartitionLease {
    pub fn partition(&self) -> i32 {
        self.partition
    }
}

impl Drop for PartitionLease {
    fn drop(&mut self) {
        let mut loads = self.loads.lock();
        if let Some(load) = loads
            .get_mut(&self.topic)
            .and_then(|loads| loads.get_mut(self.partition as usize))
        {
            load.pending = load.pending.saturating_sub(self.bytes);
        }
    }
}
