pub mod clock;
pub mod event;
pub mod snapshot;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event::{ConsumerPartitionOffset, PartitionWaterMark, TopicPartition};
pub use snapshot::{LagRow, LagSnapshot, PartitionRow};
pub use state::{shared_store, IngestStats, OffsetOutcome, StateReader, StateStore, StateWriter};
