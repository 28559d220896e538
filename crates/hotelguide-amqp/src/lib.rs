pub mod aggregate_producer;
pub mod client;
pub mod reply_waiter;
pub mod topology;

pub use aggregate_producer::AggregateProducer;
pub use client::AmqpClient;
pub use reply_waiter::{AmqpReplyWaiter, AmqpReplyWaiterFactory};
pub use topology::{ensure_topology, TopologyConfig};
