//! Worker primitives shared by query execution.
//!
//! Query scans and topology-triggered updates run as tokio tasks spawned
//! through [`spawn`], labelled with a [`TaskClass`] for tracing. Callbacks that
//! arrive on plain OS threads still get a runtime through a lazily built
//! fallback. [`CancelToken`] is the cooperative stop flag checked by scans.

mod class;
mod spawn;
mod token;

pub use class::TaskClass;
pub use spawn::spawn;
pub use token::CancelToken;
