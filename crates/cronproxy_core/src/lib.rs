//! Host server: the TCP accept loop and the per-connection HTTP/1 worker
//! that sits in front of the proxy engine.

pub mod master;
pub mod worker;

pub use master::Master;
pub use worker::{ClientStream, ConnContext, handle_connection};
