//! CLI 명령.

pub mod indicator;
pub mod once;
pub mod output;
pub mod watch;
