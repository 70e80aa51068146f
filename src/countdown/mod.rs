mod controller;
mod state;

pub use controller::{
    ChannelObserver, CountdownController, CountdownObserver, CountdownSignal, CountdownSnapshot,
};
pub use state::{CountdownState, EmergencyStatus, TickOutcome};
