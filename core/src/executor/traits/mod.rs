pub mod invoker;
pub mod sink;

pub use invoker::*;
pub use sink::*;
