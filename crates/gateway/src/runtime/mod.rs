//! Dispatch runtime: the entry store, due calculation, the per-entry
//! dispatch pipeline and the poll loop that drives it.

pub mod dispatch;
pub mod due;
pub mod entries;
pub mod lifecycle;
pub mod mailer;
pub mod poll;
pub mod weather;

pub use dispatch::{DispatchError, Dispatcher};
pub use lifecycle::{Scheduler, SchedulerStatus};
pub use poll::{CycleReport, LastCycle, PollLoop};
