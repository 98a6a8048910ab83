pub mod decoder;
pub mod transport;

pub use decoder::MeasurementDecoder;
pub use transport::MqttTransport;
