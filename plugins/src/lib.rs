pub mod factory;
pub mod invoker;
pub mod renderers;
