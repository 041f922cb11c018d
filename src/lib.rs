//! NetFlow collector daemon: shared library backing the `netflowd`
//! collector binary and the `netflow-reader` companion utility.

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

#[macro_use]
extern crate num_derive;

pub mod addr;
pub mod collector;
pub mod error;
pub mod filter;
pub mod logger;
pub mod netflow;
pub mod peer;
pub mod ratelimit;
pub mod settings;
pub mod store;
pub mod time;
