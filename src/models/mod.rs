//! Domain records shared by the stream source, the event store and the
//! synchronizer.

pub mod announcement;
pub mod calendar;
pub mod sync;

pub use self::announcement::*;
pub use self::calendar::*;
pub use self::sync::*;
