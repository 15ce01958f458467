//! The object-graph layer of the Banana serialization protocol: values,
//! slicers, unslicers, constraints, and the `Banana` driver that ties
//! them to `banana-wire`'s token stream.
//!
//! `banana-wire` knows about bytes; this crate knows about object
//! graphs. Nothing above [`protocol::Banana`] should need to reach back
//! into `banana_wire` directly except to configure it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod constraint;
pub mod error;
pub mod flogfile;
pub mod opentype;
pub mod protocol;
pub mod registry;
pub mod slicer;
pub mod unslicer;
pub mod value;

pub use constraint::Constraint;
pub use error::{BananaError, BananaResult, StepError, StepResult, Violation};
pub use protocol::{Banana, BananaConfig, SendHandle, SendOutcome};
pub use registry::{ClassRegistry, Mode};
pub use value::{BananaDecimal, Instance, ReduceProtocol, SeqKind, Shared, Value};
