pub mod activity;
pub mod digest;
pub mod loop_worker;

pub use activity::ActivityTracker;
pub use digest::{build_digest, MAX_DIGEST_CHARS};
pub use loop_worker::{IdleStudyLoop, StudyCollaborators};
