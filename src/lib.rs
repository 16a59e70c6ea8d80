//! C FFI entry points for funclib.

mod arith;
mod error;
mod greeting;
mod logging;
mod version;
