pub mod error;
pub mod value;

pub use error::{TrackError, TrackResult};
pub use value::{PropertyValue, from_property_value, key_string, to_property_value};
