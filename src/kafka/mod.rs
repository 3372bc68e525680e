pub mod balancer;
pub mod key_strategy;
pub mod producer;
pub mod topic_manager;


pub use balancer::{LeastBytesBalancer, PartitionLease};
pub use key_strategy::KeyStrategy;
pub use producer::KafkaProducer;
pub use topic_manager::TopicManager;
