pub mod annotations;
pub mod config;
pub mod splitter;
pub mod window;
pub mod writer;
