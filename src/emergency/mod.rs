mod event;
mod flow;
mod services;

pub use event::EmergencyEvent;
pub use flow::EmergencyFlow;
pub use services::{Services, ServicesBuilder};
