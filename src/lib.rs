#![allow(non_snake_case)]
//! Continuous-time stochastic simulation of species/transition nets with
//! individually tracked tokens.
//!
//! - [`net`]: static net structure, markings and (de)serialization
//! - [`sim`]: rule compilation, incremental matching, clocks and the event loop
//! - [`config`]: TOML run configuration

pub mod config;
pub mod net;
pub mod sim;
