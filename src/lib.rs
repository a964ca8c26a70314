// EcoDrive motion-event engine
// Scores driving smoothness from a stream of accelerometer samples

pub mod config;
pub mod driver;
pub mod error;
pub mod feedback;
pub mod incident;
pub mod sensor_receiver;
pub mod session;
pub mod summary;
pub mod trip_state;

pub use config::EngineConfig;
pub use driver::{PendingTimers, ReplaySession, TimerHost};
pub use error::{EngineError, EngineResult};
pub use feedback::{HapticNotifier, SessionObserver, TickSnapshot};
pub use incident::{classify, compute_magnitude, Decision, HarshEvent, HarshKind, MotionClassifier};
pub use sensor_receiver::{ReplaySource, Sample, SampleSource, SimulatedSource, TimedSample, TripLog};
pub use session::{Session, SessionPhase};
pub use summary::{TripExport, TripSummary};
pub use trip_state::{eco_score, TripState};
