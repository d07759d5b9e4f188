pub mod trace;
pub mod uio;
