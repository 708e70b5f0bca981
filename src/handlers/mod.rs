pub mod commands;
pub mod completion;
pub mod lifecycle;
