//! Signal-processing transforms for sigflow workflows.
//!
//! Every transform is a stateless [`Operation`] built from a JSON
//! configuration by the [`OperationRegistry`]. Configuration is validated
//! when the operation is constructed, before any data is touched, and
//! executing an operation never mutates its input dataset.
//!
//! - **fft**: per-channel spectrum (frequency, magnitude, phase)
//! - **filter**: zero-phase Butterworth lowpass/highpass/bandpass
//! - **unit_conversion**: named unit conversions plus scale and offset
//! - **time_shift**: moves every timestamp by a fixed number of seconds

pub mod butterworth;
pub mod error;
pub mod fft;
pub mod filter;
pub mod operation;
pub mod registry;
pub mod time_shift;
pub mod unit_conversion;

pub use error::OperationError;
pub use fft::{FftOperation, Window};
pub use filter::{Cutoff, FilterKind, FilterOperation, MAX_ORDER};
pub use operation::{Operation, OperationType};
pub use registry::OperationRegistry;
pub use time_shift::TimeShiftOperation;
pub use unit_conversion::{Conversion, UnitConversionOperation};

#[cfg(test)]
pub(crate) mod testing;
