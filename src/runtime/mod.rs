pub mod driver;

pub use driver::{HostEvent, SessionDriver};
