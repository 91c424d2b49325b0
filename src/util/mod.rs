pub mod cache;

pub use cache::{BoundedCache, Clock, SystemClock};
