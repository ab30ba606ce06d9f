//! CLI commands implementation

pub mod analyze;
pub mod init;
pub mod maintenance;
pub mod run;
pub mod status;
pub mod submit;

pub use analyze::*;
pub use init::*;
pub use maintenance::*;
pub use run::*;
pub use status::*;
pub use submit::*;
