//! Baking of compute-intensive processes.
//!
//! Simulating reflections in real-time is very compute-intensive.
//! Bakers allow you to precompute these simulations beforehand.
//!
//! Baked data is stored in a [`ProbeBatch`], one layer per [`BakedDataIdentifier`].
//!
//! ## Available bakers
//!
//! - [`ReflectionsBaker`]: Precomputes how sound propagates from sources to listeners via reflections,
//!   as energy fields (for convolution reverb) and/or parametric reverb.

#[cfg(doc)]
use crate::probe::ProbeBatch;

pub mod reflections;
pub use reflections::*;

pub mod baked_data;
pub use baked_data::*;

pub mod error;
pub use error::*;

mod policy;

mod session;
pub use session::CancelHandle;
