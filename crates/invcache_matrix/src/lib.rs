//! Matrix value type and the inversion collaborator used by `invcache`.

pub mod invert;
pub mod matrix;

pub use invert::{GaussJordan, InvertError, InvertOptions, Inverter, invert};
pub use matrix::{Matrix, ShapeError};
