pub mod hello;
pub mod storage;
pub mod streaming;
pub mod system;
pub mod tasks;
