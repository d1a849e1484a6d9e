pub mod line_track;

pub use line_track::{LineAction, LineInfo, LineTrack, LineTrackConfig};
