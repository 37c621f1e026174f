pub mod frame;
pub mod model;
pub mod query;
pub mod reader;
mod wire;
pub mod writer;

pub use frame::FrameError;
pub use model::{DiskIo, MemoryUsage, NetworkIo, TelemetryRecord};
pub use query::{OutputFormat, QueryResult, TimeRange};
pub use reader::{LogReader, LogSummary, ReadError, Records};
pub use writer::LogWriter;
