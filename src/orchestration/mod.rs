pub mod clock;

pub use clock::{drive_once, elapsed_since_start, run_clock};
