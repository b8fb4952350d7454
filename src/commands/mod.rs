pub mod config;
pub mod permissions;
pub mod scanner;

pub use config::*;
pub use permissions::*;
pub use scanner::*;
