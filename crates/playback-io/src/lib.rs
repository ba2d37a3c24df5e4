// crates/playback-io/src/lib.rs
//
// IOTrait surface (spec §4.C/§4.D): the Reader/Writer contract, the option
// string map, the extension registry, and the concrete format plugins.

pub mod cineon;
pub mod ffmpeg_movie;
pub mod options;
pub mod png_seq;
pub mod ppm;
pub mod registry;
pub mod traits;

pub use options::Options;
pub use registry::IORegistry;
pub use traits::{AudioData, ReadHandle, ReadPlugin, Reader, Writer, WritePlugin};

/// Build a registry with every plugin this workspace ships registered,
/// first-registered-wins order matching the teacher's own "first match"
/// extension dispatch (`registry.rs`).
pub fn default_registry() -> IORegistry {
    let mut registry = IORegistry::new();
    registry.register_read_plugin(Box::new(ppm::PpmReadPlugin));
    registry.register_read_plugin(Box::new(cineon::CineonReadPlugin));
    registry.register_read_plugin(Box::new(png_seq::PngSequenceReadPlugin));
    registry.register_read_plugin(Box::new(ffmpeg_movie::FfmpegReadPlugin));

    registry.register_write_plugin(Box::new(ppm::PpmWritePlugin));
    registry.register_write_plugin(Box::new(cineon::CineonWritePlugin));
    registry.register_write_plugin(Box::new(png_seq::PngSequenceWritePlugin));
    registry.register_write_plugin(Box::new(ffmpeg_movie::FfmpegWritePlugin));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_no_panics_on_construction() {
        let registry = default_registry();
        assert_eq!(registry.reader_count(), 0);
    }
}
