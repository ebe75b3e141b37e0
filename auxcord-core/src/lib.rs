mod bus;
mod dispatch;
mod events;
mod registry;

pub use bus::*;
pub use dispatch::*;
pub use events::*;
pub use registry::*;
