mod api;
mod sensor;
mod sensor_type;
mod state;

pub use api::*;
pub use sensor::*;
pub use sensor_type::*;
pub use state::*;
