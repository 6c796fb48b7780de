pub mod pidfile;
pub mod probe;
pub mod runtime;
