#![doc = include_str!("../README.md")]

mod config;
mod context;
mod error;
mod gate;
mod policy;
mod pool;
mod processor;
mod queue;
mod stats;

pub use crate::config::*;
pub use crate::context::*;
pub use crate::error::*;
pub use crate::gate::*;
pub use crate::policy::*;
pub use crate::pool::WorkerPool;
pub use crate::processor::*;
pub use crate::stats::*;
