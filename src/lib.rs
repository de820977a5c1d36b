pub mod analysis;
pub mod delivery;
pub mod email;
pub mod heuristic;
pub mod protocol;
pub mod reconcile;
pub mod remote;
pub mod router;
pub mod settings;
pub mod store;

pub use analysis::AnalysisResult;
pub use delivery::{PollOutcome, ResultPoller};
pub use email::EmailData;
pub use heuristic::LocalScanner;
pub use reconcile::reconcile;
pub use remote::{RemoteScanner, ScanError, ScanErrorKind};
pub use router::{AnalysisOutcome, AnalysisRouter};
pub use settings::{Settings, SettingsProvider};
pub use store::{KvStore, ResultStore, StoredAnalysis};
