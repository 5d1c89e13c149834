//! Post-extraction command record embedded in self-extracting images.
//!
//! Layout (1282 bytes, no padding):
//! ```text
//! Offset  Size  Field
//! 0       512   command, NUL-terminated
//! 512     512   arguments, NUL-terminated
//! 1024    1     silent (0/1)
//! 1025    1     wait for completion (0/1)
//! 1026    256   working directory, NUL-terminated
//! ```

use std::path::{Path, PathBuf};

pub const COMMAND_SIZE: usize = 512;
pub const ARGUMENTS_SIZE: usize = 512;
pub const WORKING_DIR_SIZE: usize = 256;
pub const CONFIG_SIZE: usize = COMMAND_SIZE + ARGUMENTS_SIZE + 2 + WORKING_DIR_SIZE;

const ARGUMENTS_OFFSET: usize = COMMAND_SIZE;
const SILENT_OFFSET: usize = ARGUMENTS_OFFSET + ARGUMENTS_SIZE;
const WAIT_OFFSET: usize = SILENT_OFFSET + 1;
const WORKING_DIR_OFFSET: usize = WAIT_OFFSET + 1;

/// Command the stub runs after extraction.
///
/// Strings longer than their field are truncated on encode to the field
/// width minus the terminator, at a character boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConfig {
    pub command:             String,
    pub arguments:           String,
    /// Hide the console window of the command where the platform has one.
    pub silent:              bool,
    pub wait_for_completion: bool,
    /// Empty means the extraction directory.
    pub working_dir:         String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        CommandConfig {
            command:             String::new(),
            arguments:           String::new(),
            silent:              false,
            wait_for_completion: true,
            working_dir:         String::new(),
        }
    }
}

fn encode_str(field: &mut [u8], value: &str) {
    let mut len = value.len().min(field.len() - 1);
    while !value.is_char_boundary(len) {
        len -= 1;
    }
    field[..len].copy_from_slice(&value.as_bytes()[..len]);
}

fn decode_str(field: &[u8]) -> String {
    let end = field.iter().position(|&c| c == b'\0').unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

impl CommandConfig {
    pub fn to_bytes(&self) -> [u8; CONFIG_SIZE] {
        let mut buf = [0u8; CONFIG_SIZE];
        encode_str(&mut buf[..ARGUMENTS_OFFSET], &self.command);
        encode_str(&mut buf[ARGUMENTS_OFFSET..SILENT_OFFSET], &self.arguments);
        buf[SILENT_OFFSET] = self.silent as u8;
        buf[WAIT_OFFSET] = self.wait_for_completion as u8;
        encode_str(&mut buf[WORKING_DIR_OFFSET..], &self.working_dir);
        buf
    }

    pub fn from_bytes(buf: &[u8; CONFIG_SIZE]) -> Self {
        CommandConfig {
            command:             decode_str(&buf[..ARGUMENTS_OFFSET]),
            arguments:           decode_str(&buf[ARGUMENTS_OFFSET..SILENT_OFFSET]),
            silent:              buf[SILENT_OFFSET] != 0,
            wait_for_completion: buf[WAIT_OFFSET] != 0,
            working_dir:         decode_str(&buf[WORKING_DIR_OFFSET..]),
        }
    }

    pub fn has_command(&self) -> bool { !self.command.is_empty() }

    /// Command followed by its arguments, separated by a space.
    pub fn command_line(&self) -> String {
        if self.arguments.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.arguments)
        }
    }

    /// Configured working directory, or `default` when none is set.
    pub fn working_dir_or(&self, default: &Path) -> PathBuf {
        if self.working_dir.is_empty() {
            default.to_path_buf()
        } else {
            PathBuf::from(&self.working_dir)
        }
    }
}
