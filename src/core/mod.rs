//! Core types shared by every build phase.

mod error;
mod id;
mod mode;
mod session;
mod state;

pub use error::{
    BuildError, BuildFailure, EmissionError, ManifestConsistencyError, ResolutionError,
    RuleMatchAmbiguity, TransformError,
};
pub use id::ModuleId;
pub use mode::{BuildMode, ModeProfile, ScriptConstants};
pub use session::BuildSession;
pub use state::{is_shutdown, register_server, setup_shutdown_handler};
