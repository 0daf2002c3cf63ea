pub mod engine;
pub mod error;
pub mod queue;
pub mod remote;
pub mod state;
pub mod tracker;
pub mod trash;

pub use engine::{PhaseTiming, SyncConfig, SyncEngine, SyncReport};
pub use error::{ObjectFailure, RemotePhase, SyncError};
pub use queue::{ChangeKind, ChangeRecord, ObjectOp, OperationQueue};
pub use remote::{PhaseStats, RemoteSynchronizer};
pub use state::{StateLayout, SyncState};
pub use tracker::{ChangeTracker, GitTracker};
pub use trash::{ExcludeMatcher, StageOptions, StageSummary, TrashStager};
