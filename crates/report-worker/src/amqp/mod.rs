mod result_producer;

pub use result_producer::ResultProducer;
