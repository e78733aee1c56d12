pub mod countdown;

pub use countdown::{spawn_countdown, CountdownHandle};
