//! charmops CLI command implementations, exposed as a library so the
//! integration tests can drive them without spawning the binary.

pub mod commands;
