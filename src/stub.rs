//! Sources of the extractor stub that self-extracting images start with.

use std::{
    borrow::Cow,
    env::{consts::EXE_SUFFIX, current_exe},
    fs::{read, read_link},
    path::PathBuf,
};

use sfxformat::{Error, Result};
use tracing::debug;

/// File name of the extractor stub binary, without the platform suffix.
pub const STUB_NAME: &str = "sfxstub";

/// Supplies the bytes of an extractor stub executable.
pub trait StubProvider {
    fn load(&self) -> Result<Cow<'_, [u8]>>;

    /// Human readable origin of the stub, shown in progress output.
    fn describe(&self) -> String;
}

fn non_empty(path: &std::path::Path, bytes: Vec<u8>) -> Result<Cow<'static, [u8]>> {
    if bytes.is_empty() {
        return Err(Error::StubUnavailable(format!("{} is empty", path.display())));
    }
    Ok(Cow::Owned(bytes))
}

/// Stub read from an explicit path.
#[derive(Debug, Clone)]
pub struct StubFile(pub PathBuf);

impl StubProvider for StubFile {
    fn load(&self) -> Result<Cow<'_, [u8]>> {
        let bytes = read(&self.0)
            .map_err(|e| Error::StubUnavailable(format!("couldn't read {}: {}", self.0.display(), e)))?;
        non_empty(&self.0, bytes)
    }

    fn describe(&self) -> String { self.0.display().to_string() }
}

/// Stub installed next to the running `sfxarc` executable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiblingStub;

impl SiblingStub {
    pub fn path(&self) -> Result<PathBuf> {
        let mut exe = current_exe()
            .map_err(|e| Error::StubUnavailable(format!("couldn't locate current executable: {}", e)))?;
        while let Ok(link) = read_link(&exe) {
            exe = link;
        }
        let directory = exe
            .parent()
            .ok_or_else(|| Error::StubUnavailable("current executable has no parent directory".into()))?;
        Ok(directory.join(format!("{}{}", STUB_NAME, EXE_SUFFIX)))
    }
}

impl StubProvider for SiblingStub {
    fn load(&self) -> Result<Cow<'_, [u8]>> {
        let path = self.path()?;
        debug!(path = %path.display(), "looking for stub next to executable");
        let bytes = read(&path)
            .map_err(|e| Error::StubUnavailable(format!("couldn't read {}: {}", path.display(), e)))?;
        non_empty(&path, bytes)
    }

    fn describe(&self) -> String {
        self.path()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|_| STUB_NAME.to_string())
    }
}

#[cfg(feature = "embedded-stub")]
mod embedded {
    use staticfilemap::StaticFileMap;

    use super::*;

    #[derive(StaticFileMap)]
    #[parse("env")]
    #[names("SFXARC_TARGETS")]
    #[files("SFXARC_FILES")]
    #[compression(16)]
    #[algorithm("zstd")]
    struct StubMap;

    /// Stubs compiled into `sfxarc` by its build script, one per target.
    #[derive(Debug, Clone, Default)]
    pub struct EmbeddedStub {
        /// Target triple or unique part of one. The native target when unset.
        pub target: Option<String>,
    }

    impl EmbeddedStub {
        pub fn targets() -> &'static [&'static str] { StubMap::keys() }

        fn target_name(&self) -> Result<&'static str> {
            match self.target.as_deref() {
                None | Some("native") | Some("default") => StubMap::keys()
                    .first()
                    .copied()
                    .ok_or_else(|| Error::StubUnavailable("no embedded stubs".into())),
                Some(name) => StubMap::get_match_index(name)
                    .map(|id| StubMap::keys()[id])
                    .ok_or_else(|| Error::StubUnavailable(format!("no embedded stub for target {}", name))),
            }
        }
    }

    impl StubProvider for EmbeddedStub {
        fn load(&self) -> Result<Cow<'_, [u8]>> {
            let name = self.target_name()?;
            let compressed = StubMap::get_match(name)
                .ok_or_else(|| Error::StubUnavailable(format!("no embedded stub for target {}", name)))?;
            let bytes = zstd::decode_all(compressed)
                .map_err(|e| Error::StubUnavailable(format!("couldn't unpack embedded stub {}: {}", name, e)))?;
            Ok(Cow::Owned(bytes))
        }

        fn describe(&self) -> String {
            self.target_name()
                .map(|name| format!("embedded {}", name))
                .unwrap_or_else(|_| "embedded".to_string())
        }
    }
}

#[cfg(feature = "embedded-stub")]
pub use embedded::EmbeddedStub;

/// Tries each provider in order and uses the first that loads.
pub struct FirstAvailable(pub Vec<Box<dyn StubProvider>>);

impl StubProvider for FirstAvailable {
    fn load(&self) -> Result<Cow<'_, [u8]>> {
        let mut reasons = Vec::new();
        for provider in &self.0 {
            match provider.load() {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    debug!(stub = %provider.describe(), error = %e, "stub unavailable");
                    reasons.push(e.to_string());
                }
            }
        }
        Err(Error::StubUnavailable(reasons.join("; ")))
    }

    fn describe(&self) -> String {
        self.0
            .iter()
            .map(|provider| provider.describe())
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

/// Explicit stub path if given, otherwise the embedded stub when compiled
/// in, then the stub next to the executable.
pub fn default_provider(explicit: Option<PathBuf>) -> Box<dyn StubProvider> {
    if let Some(path) = explicit {
        return Box::new(StubFile(path));
    }
    let mut providers: Vec<Box<dyn StubProvider>> = Vec::new();
    #[cfg(feature = "embedded-stub")]
    providers.push(Box::new(EmbeddedStub::default()));
    providers.push(Box::new(SiblingStub));
    Box::new(FirstAvailable(providers))
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use super::*;

    #[test]
    fn test_stub_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stub.bin");
        write(&path, b"stub bytes").unwrap();
        assert_eq!(StubFile(path.clone()).load().unwrap().as_ref(), b"stub bytes");

        write(&path, b"").unwrap();
        assert!(matches!(StubFile(path).load(), Err(Error::StubUnavailable(_))));

        let missing = StubFile(dir.path().join("missing"));
        assert!(matches!(missing.load(), Err(Error::StubUnavailable(_))));
    }

    #[test]
    fn test_first_available() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stub.bin");
        write(&path, b"second").unwrap();
        let providers: Vec<Box<dyn StubProvider>> = vec![
            Box::new(StubFile(dir.path().join("missing"))) as Box<dyn StubProvider>,
            Box::new(StubFile(path)),
        ];
        let provider = FirstAvailable(providers);
        assert_eq!(provider.load().unwrap().as_ref(), b"second");
        assert!(provider.describe().contains(" or "));

        let none = FirstAvailable(vec![Box::new(StubFile(dir.path().join("missing"))) as Box<dyn StubProvider>]);
        assert!(matches!(none.load(), Err(Error::StubUnavailable(_))));
    }

    #[test]
    fn test_explicit_provider() {
        let provider = default_provider(Some(PathBuf::from("custom-stub")));
        assert_eq!(provider.describe(), "custom-stub");
    }

    #[test]
    fn test_sibling_path() {
        let path = SiblingStub.path().unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with(STUB_NAME));
    }
}
