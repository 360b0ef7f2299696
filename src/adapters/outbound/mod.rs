pub mod memory;
pub mod network;
