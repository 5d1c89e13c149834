//! Archive packer and self-extracting executable builder.
//!
//! The container codec lives in [`sfxformat`], which is shared with the
//! `sfxstub` extractor that self-extracting images start with.

pub mod packer;
pub mod permissions;
pub mod stub;

pub use packer::{PackedInfo, Packer};
pub use sfxformat;
pub use stub::{default_provider, FirstAvailable, SiblingStub, StubFile, StubProvider, STUB_NAME};

#[cfg(feature = "embedded-stub")]
pub use stub::EmbeddedStub;
