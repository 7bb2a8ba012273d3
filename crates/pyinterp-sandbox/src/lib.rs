pub mod common;
pub mod env;
pub mod executor;
pub mod interpreter;
pub mod log;
pub mod registry;
pub mod runtime_resolver;
pub mod security;

pub use interpreter::PythonInterpreter;
