//! CLI command handling

pub mod context;
pub mod init;
pub mod output;
pub mod refresh;
pub mod run;
pub mod status;
pub mod test_notify;

pub use context::*;
pub use init::*;
pub use output::*;
pub use refresh::*;
pub use run::*;
pub use status::*;
pub use test_notify::*;
