//! Tuner Firmware Library
//!
//! Firmware handling shared by chips that need an image uploaded before they
//! will tune:
//!
//! - [`FirmwareImage`]: an image file plus its staleness sidecar
//! - [`flat`]: two-segment images with a chip-specific handshake
//! - [`bytecode`]: length-prefixed write/sleep/reset streams
//! - [`sections`]: versioned blobs of selectable sub-images
//! - [`checksum`]: register burst uploads closed by a CRC-16 check word
//!
//! Every transfer is split to the transport's transaction limit. A transfer
//! is only recorded in the sidecar once it has fully succeeded.

pub mod bytecode;
pub mod checksum;
pub mod flat;
pub mod image;
pub mod sections;

pub use bytecode::ResetHook;
pub use flat::{load_split, SplitImage};
pub use image::FirmwareImage;
pub use sections::{SectionIndex, SectionKind, SectionedLoader};
