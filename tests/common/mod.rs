//! Stand-in encoder and recognizer scripts for process-backed tests.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_fs::TempDir;
use assert_fs::prelude::*;

/// Encoder that records its arguments and writes a few bytes to its last argument
pub const FFMPEG_OK: &str = r#"#!/bin/sh
printf '%s\n' "$*" >> "$(dirname "$0")/calls.log"
case "$*" in
  *-version*) echo "ffmpeg version 0.0-test"; exit 0 ;;
esac
for last; do :; done
printf 'fake media' > "$last"
"#;

/// Encoder that fails whenever it is asked to apply the subtitle filter
pub const FFMPEG_FAILING_BURN: &str = r#"#!/bin/sh
printf '%s\n' "$*" >> "$(dirname "$0")/calls.log"
for last; do :; done
case "$*" in
  *subtitles=*) printf 'partial' > "$last"; echo "Unable to open subtitles" >&2; exit 1 ;;
esac
printf 'fake media' > "$last"
"#;

/// Encoder that always fails
pub const FFMPEG_BROKEN: &str = r#"#!/bin/sh
echo "Invalid data found when processing input" >&2
exit 1
"#;

/// Recognizer writing `<stem><suffix>` into --output_dir
pub fn whisper_writing(suffix: &str) -> String {
    format!(
        r#"#!/bin/sh
input="$1"
shift
outdir=.
while [ $# -gt 0 ]; do
  case "$1" in
    --output_dir) outdir="$2"; shift ;;
  esac
  shift
done
name=$(basename "$input" .wav)
printf '1\n00:00:00,000 --> 00:00:02,000\nhello world\n\n' > "$outdir/$name{suffix}"
echo "Detected language: English" >&2
"#
    )
}

/// Recognizer that writes no file and prints `stdout`
pub fn whisper_printing(stdout: &str) -> String {
    format!("#!/bin/sh\nprintf '{}'\n", stdout)
}

/// Temp directory holding executable scripts
pub struct FakeBin {
    pub dir: TempDir,
}

impl FakeBin {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let child = self.dir.child(name);
        child.write_str(body).unwrap();
        fs::set_permissions(child.path(), fs::Permissions::from_mode(0o755)).unwrap();
        child.path().to_path_buf()
    }

    /// Argument lines recorded by the encoder scripts
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("calls.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Regular files and directories directly inside `dir`
pub fn entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    entries.sort();
    entries
}

/// Argument following `flag` in a recorded encoder call
pub fn arg_after<'a>(call: &'a str, flag: &str) -> Option<&'a str> {
    call.split(' ').skip_while(|arg| *arg != flag).nth(1)
}

/// One unescaping pass of ffmpeg's token reader, stopping at an unescaped terminator
fn read_token<'a>(input: &'a str, terminators: &[char]) -> (String, &'a str) {
    let mut token = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            _ if terminators.contains(&c) => return (token, &input[i..]),
            '\\' => token.extend(chars.next().map(|(_, next)| next)),
            '\'' => {
                for (_, quoted) in chars.by_ref() {
                    if quoted == '\'' {
                        break;
                    }
                    token.push(quoted);
                }
            }
            _ => token.push(c),
        }
    }
    (token, "")
}

/// Filename ffmpeg opens for a `subtitles=filename=...` filter, or `None`
/// when the graph or option list would be split inside the value.
pub fn subtitle_filename(filter: &str) -> Option<String> {
    let args = filter.strip_prefix("subtitles=")?;
    let (options, rest) = read_token(args, &['[', ']', ',', ';']);
    if !rest.is_empty() {
        return None;
    }
    let (filename, rest) = read_token(options.strip_prefix("filename=")?, &[':']);
    rest.is_empty().then_some(filename)
}
