pub mod driver;
pub mod progress;
pub mod upstream;

pub use driver::BlockSyncDriver;
pub use progress::{ProgressData, ProgressEvent, ProgressEventKind};
pub use upstream::{BlockNotification, JsonRpcUpstreamNode, UpstreamNode};
