//! Repository traits (ports)

mod repositories;

pub use repositories::{
    MagicLinkConsumeOutcome, MagicLinkRepository, RepoResult, SessionRepository, UserRepository,
};
