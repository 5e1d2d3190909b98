pub mod apply;
pub mod frames;
pub mod guards;
pub mod service;
