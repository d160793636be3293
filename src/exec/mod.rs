// src/exec/mod.rs

//! Run execution: placeholder expansion, the lazy stderr sink and the
//! process supervisor.

pub mod lazy_writer;
pub mod supervisor;
pub mod template;

pub use lazy_writer::LazyOutputWriter;
pub use supervisor::execute;
