//! MP4 (ISO-BMFF) container support

pub mod boxes;
pub mod reader;
pub mod sample_table;
pub mod writer;

pub use reader::{Mp4SampleReader, VideoTrackInfo};
pub use sample_table::{SampleInfo, SampleTable, VisualSampleEntry};
pub use writer::Mp4Writer;
