pub mod actions;
pub mod ws;
