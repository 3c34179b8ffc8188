//! Network reachability diagnosis.
//!
//! Checks are tiered from cheap and local to slow and remote: is there an
//! adapter, does it have a carrier, and only then can a host be reached.

mod iface;
mod probe;
mod prober;
mod proxy;

pub use iface::*;
pub use probe::*;
pub use prober::*;
