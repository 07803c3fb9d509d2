/*!
`switch-lower` lowers `switch` statements for a delayed-branch target, with fused compare-and-branch
support.

Switch keys are either small immediates or constants which must be loaded from a constant table. For
each comparison, the cheapest correct encoding is chosen: a single fused compare-and-branch when the
target is provably in its short reach and the pipeline allows it, and a compare, a branch and a delay
slot otherwise. Forward distances are estimated from the label hints of an earlier emission pass.
*/
#![forbid(unsafe_code, missing_docs, missing_debug_implementations)]

pub mod util;

pub mod asm;
pub mod ctx;
pub mod error;
pub mod switch;
pub mod target;

pub use ctx::EmitCtx;
pub use error::Error;
