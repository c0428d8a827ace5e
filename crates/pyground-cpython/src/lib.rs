//! Embedded CPython engine for the pyground run harness.
//!
//! [`CpythonLoader`] initializes the interpreter (importing any preload
//! packages) and yields a [`CpythonEngine`], which runs guest code in a
//! persistent `__main__`-style namespace with `sys.stdout` and `sys.stderr`
//! routed into the harness's output sink.
//!
//! The interpreter is process-global. Redirecting `sys` streams is
//! therefore only sound while one engine at a time executes, which the
//! harness guarantees by serializing runs behind the engine handle's lock.

mod engine;
mod stream;

pub use crate::{
    engine::{CpythonEngine, CpythonLoader},
    stream::OutputAborted,
};
