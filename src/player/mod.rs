pub mod coordinator;
pub mod traits;

pub use coordinator::{Command, Coordinator, PlaybackState, PlayerHandle, Snapshot};
pub use traits::{HostTransport, NowPlaying, TrackService, TransportControls, TransportEvent};
