pub mod attempts;

pub use attempts::{
    AttemptRepository, FileAttemptRepository, MemoryAttemptRepository, PersistedAttempt,
    RepositoryError,
};
