//! Input handling for remote controls and other key producers.

pub mod rc;
