//! Stub workers and archive builders.

use crate::config::StageConfig;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Uppercases every line.
pub const UPPERCASE: &str =
    r#"while IFS= read -r line; do printf '%s\n' "$line" | tr '[:lower:]' '[:upper:]'; done"#;

/// Prefixes every line with its 1-based position in the stream.
pub const ECHO_INDEX: &str =
    r#"n=0; while IFS= read -r line; do n=$((n+1)); printf '%s:%s\n' "$n" "$line"; done"#;

/// Answers the first line, then exits with status 3 on the next one.
pub const DIE_AFTER_FIRST: &str =
    r#"IFS= read -r line; printf '%s\n' "$line"; IFS= read -r line; exit 3"#;

/// Echoes each line after five seconds.
pub const SLOW: &str = r#"while IFS= read -r line; do sleep 5; printf '%s\n' "$line"; done"#;

/// Prefixes every line with `$GREETING`.
pub const ENV_GREETING: &str =
    r#"while IFS= read -r line; do printf '%s %s\n' "$GREETING" "$line"; done"#;

/// Scores `{"text": ...}` records against `sentiment/positive.txt` in the
/// current directory. Empty texts produce `null`.
pub const SENTIMENT: &str = r#"
while IFS= read -r line; do
  case "$line" in
    *'"text":""'*) echo null; continue ;;
  esac
  label=negative
  while IFS= read -r word; do
    case "$line" in *"$word"*) label=positive ;; esac
  done < sentiment/positive.txt
  printf '%s,"sentiment":"%s"}\n' "${line%?}" "$label"
done
"#;

/// Builds a zip archive in memory.
///
/// Each entry is `(path, contents, unix mode)`; `None` contents add a
/// directory.
pub fn build_zip(entries: &[(&str, Option<&str>, u32)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents, mode) in entries {
        let options = SimpleFileOptions::default().unix_permissions(*mode);
        match contents {
            Some(body) => {
                writer.start_file(*name, options).unwrap();
                writer.write_all(body.as_bytes()).unwrap();
            }
            None => writer.add_directory(*name, options).unwrap(),
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Writes an executable shell script and returns its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

/// A stage configuration running `script` with `/bin/sh -c`.
pub fn sh_config(name: &str, script: &str) -> StageConfig {
    StageConfig::new("/bin/sh")
        .with_name(name)
        .with_args(["-c", script])
        .with_shutdown_grace(1.0)
}
