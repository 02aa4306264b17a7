//! Populates geoindex indices from files on disk.
//!
//! A [`Collector`] walks a directory tree and hands each file to the
//! [`FileProcessor`] registered for its extension. Processors ship for GPX
//! tracks and JPEG photographs; the JPEG processor can keep its extracted
//! metadata in a [`MetadataCache`].

mod cache;
mod collector;
mod photo;
mod processor;
mod track;

pub use cache::{CacheError, MetadataCache};
pub use collector::{
    CollectError, CollectStats, Collector, register_data_file_processors,
    register_image_file_processors,
};
pub use photo::JpegFileProcessor;
pub use processor::{FileProcessor, ProcessError};
pub use track::GpxFileProcessor;
