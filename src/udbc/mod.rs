pub mod value;

pub mod connection;
pub mod deserializer;
pub mod driver;
pub mod serializer;

pub use value::{Row, Value, to_values};
