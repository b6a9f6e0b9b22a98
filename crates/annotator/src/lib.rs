// Library crate: the annotation core, usable headless from tests and from
// the command-line driver.

pub mod app;
pub mod assets;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod net;
pub mod state;
pub mod viewport;
