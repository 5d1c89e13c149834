use std::{
    env::current_dir,
    fs::canonicalize,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use jwalk::WalkDir;
use sfxarc::sfxformat::CompressionLevel;
use tracing::warn;

pub fn get_compression_level(fastest: bool, best: bool) -> CompressionLevel {
    if fastest {
        CompressionLevel::Fastest
    } else if best {
        CompressionLevel::Best
    } else {
        CompressionLevel::Normal
    }
}

/// Shortens `path` to be relative to the working directory for display.
pub fn display_path(path: &Path) -> String {
    current_dir()
        .ok()
        .and_then(|cwd| canonicalize(cwd).ok())
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

/// Resolves the input arguments into the list of files to store.
///
/// Directories are walked recursively and contribute their files in sorted
/// order, including symlinks that resolve to files. Every argument must
/// exist. Other arguments that aren't directories, such as devices or pipes,
/// are passed through and reported as skipped while writing.
pub fn get_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let cwd = current_dir().context("couldn't get the current directory")?;
    let mut files = Vec::new();
    for input in inputs {
        let source = cwd.join(input);
        let source = canonicalize(&source).with_context(|| format!("input path does not exist: {}", source.display()))?;
        if source.is_dir() {
            let mut walked = WalkDir::new(&source)
                .skip_hidden(false)
                .sort(true)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| {
                    let file_type = entry.file_type();
                    if file_type.is_file() {
                        return true;
                    }
                    if file_type.is_symlink() {
                        let path = entry.path();
                        if path.is_file() {
                            return true;
                        }
                        warn!(path = %path.display(), "skipping symlink that doesn't resolve to a file");
                    }
                    false
                })
                .map(|entry| entry.path())
                .collect::<Vec<_>>();
            walked.sort();
            files.extend(walked);
        } else {
            files.push(source);
        }
    }
    if files.is_empty() {
        bail!("no input files found");
    }
    Ok(files)
}

/// Validates an output file location and returns its absolute path.
pub fn get_output(output: &Path) -> Result<PathBuf> {
    let output = current_dir().context("couldn't get the current directory")?.join(output);
    let Some(name) = output.file_name() else {
        bail!("output path has no file name: {}", output.display());
    };
    let parent = output.parent().filter(|parent| parent.is_dir());
    let Some(parent) = parent else {
        bail!("output path has no parent directory: {}", output.display());
    };
    if output.is_dir() {
        bail!("output path is a directory: {}", output.display());
    }
    Ok(canonicalize(parent)
        .with_context(|| format!("output path is invalid: {}", output.display()))?
        .join(name))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_compression_level() {
        assert_eq!(get_compression_level(false, false), CompressionLevel::Normal);
        assert_eq!(get_compression_level(true, false), CompressionLevel::Fastest);
        assert_eq!(get_compression_level(false, true), CompressionLevel::Best);
    }

    #[test]
    fn test_inputs_expand_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("tree").join("nested")).unwrap();
        fs::create_dir_all(root.join("tree").join("empty")).unwrap();
        fs::write(root.join("tree").join("b.txt"), "b").unwrap();
        fs::write(root.join("tree").join("nested").join("a.txt"), "a").unwrap();
        fs::write(root.join("single.txt"), "s").unwrap();

        let files = get_inputs(&[root.join("tree"), root.join("single.txt")]).unwrap();
        assert_eq!(
            files,
            [
                root.join("tree").join("b.txt"),
                root.join("tree").join("nested").join("a.txt"),
                root.join("single.txt"),
            ]
        );
    }

    #[test]
    fn test_inputs_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = get_inputs(&[dir.path().join("missing")]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        fs::create_dir_all(dir.path().join("empty")).unwrap();
        let err = get_inputs(&[dir.path().join("empty")]).unwrap_err();
        assert_eq!(err.to_string(), "no input files found");
    }

    #[cfg(unix)]
    #[test]
    fn test_inputs_pass_through_special_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = canonicalize(dir.path()).unwrap();
        fs::write(root.join("single.txt"), "s").unwrap();

        let files = get_inputs(&[root.join("single.txt"), PathBuf::from("/dev/null")]).unwrap();
        assert_eq!(files, [root.join("single.txt"), PathBuf::from("/dev/null")]);

        let files = get_inputs(&[PathBuf::from("/dev/null")]).unwrap();
        assert_eq!(files, [PathBuf::from("/dev/null")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_inputs_follow_file_symlinks() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let root = canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("tree")).unwrap();
        fs::create_dir_all(root.join("elsewhere")).unwrap();
        fs::write(root.join("target.txt"), "t").unwrap();
        fs::write(root.join("tree").join("a.txt"), "a").unwrap();
        symlink(root.join("target.txt"), root.join("tree").join("link.txt")).unwrap();
        symlink(root.join("missing.txt"), root.join("tree").join("broken.txt")).unwrap();
        symlink(root.join("elsewhere"), root.join("tree").join("dir_link")).unwrap();

        let files = get_inputs(&[root.join("tree")]).unwrap();
        assert_eq!(files, [root.join("tree").join("a.txt"), root.join("tree").join("link.txt")]);
    }

    #[test]
    fn test_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = get_output(&dir.path().join("out.bin")).unwrap();
        assert_eq!(output, canonicalize(dir.path()).unwrap().join("out.bin"));
        assert!(get_output(dir.path()).is_err());
        assert!(get_output(&dir.path().join("missing").join("out.bin")).is_err());
    }
}
