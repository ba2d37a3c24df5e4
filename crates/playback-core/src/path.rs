// crates/playback-core/src/path.rs
//
// Parses a single path string into directory / base name / frame number /
// extension components, and groups sibling files into numbered sequences.
// The parse algorithm is ported field-for-field from `tlCore/Path.cpp`:
// scan the extension from the back, then the trailing digit run bounded by
// `max_number_digits`, then the directory separator, with the Windows
// drive-letter special case folded in at the end.

use serde::{Deserialize, Serialize};
use std::path::Path as StdPath;

fn is_path_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathOptions {
    pub max_number_digits: usize,
    pub negative_numbers: bool,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            max_number_digits: 9,
            negative_numbers: false,
        }
    }
}

/// A parsed path: directory, base name, optional zero-padded frame number,
/// and extension, plus the `[min, max]` range it represents once grouped
/// into a sequence by [`list_sequences`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub directory: String,
    pub base_name: String,
    pub number: String,
    pub number_value: i64,
    pub padding: usize,
    pub extension: String,
    pub sequence_min: i64,
    pub sequence_max: i64,
}

impl Path {
    pub fn new(value: &str, options: &PathOptions) -> Self {
        let mut p = Path::default();
        if value.is_empty() {
            return p;
        }
        let chars: Vec<char> = value.chars().collect();
        let size = chars.len();
        // Mirrors the C string's implicit null terminator at `value[size]`,
        // which the original scan relies on being neither a separator nor a
        // digit nor '.'.
        let at = |idx: usize| -> char {
            if idx < size {
                chars[idx]
            } else {
                '\0'
            }
        };

        // Find the extension.
        let mut i = size - 1;
        while i > 0 && at(i) != '.' && !is_path_separator(at(i)) {
            i -= 1;
        }
        if i > 0 && at(i) == '.' && at(i - 1) != '.' && !is_path_separator(at(i - 1)) {
            p.extension = chars[i..size].iter().collect();
        } else {
            i = size;
        }

        // Find the number (optionally preceded by a single '-' sign).
        let mut j = i;
        let mut start = i;
        while start > 0 && at(start - 1).is_ascii_digit() {
            start -= 1;
        }
        let mut number_start = start;
        if options.negative_numbers && number_start > 0 && at(number_start - 1) == '-' {
            number_start -= 1;
        }
        if start < j && at(start).is_ascii_digit() && (j - number_start) <= options.max_number_digits {
            i = number_start;
            p.number = chars[i..j].iter().collect();
            p.number_value = p.number.parse().unwrap_or(0);
            let digit_len = j - start;
            p.padding = if digit_len > 1 && at(start) == '0' {
                digit_len
            } else {
                0
            };
            p.sequence_min = p.number_value;
            p.sequence_max = p.number_value;
        } else {
            i = j;
        }
        j = i;

        // Find the directory.
        while i > 0 && !is_path_separator(at(i)) {
            i -= 1;
        }
        let mut k = 0;
        if is_path_separator(at(i)) {
            p.directory = chars[0..=i].iter().collect();
            k = i + 1;
        }

        // Find the base name.
        if k < j {
            p.base_name = chars[k..j].iter().collect();
        }

        // Windows drive-letter special case: a bare "C:" parsed with no
        // directory is really the directory.
        if p.directory.is_empty()
            && p.base_name.chars().count() == 2
            && p.base_name.chars().next().map(|c| c.is_ascii_uppercase()) == Some(true)
            && p.base_name.chars().nth(1) == Some(':')
        {
            std::mem::swap(&mut p.directory, &mut p.base_name);
        }

        p
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
            && self.base_name.is_empty()
            && self.number.is_empty()
            && self.extension.is_empty()
    }

    pub fn is_sequence(&self) -> bool {
        !self.number.is_empty() && self.sequence_max > self.sequence_min
    }

    pub fn is_absolute(&self) -> bool {
        let mut chars = self.directory.chars();
        match chars.next() {
            Some(c) if is_path_separator(c) => true,
            Some(c) if c.is_ascii_uppercase() => chars.next() == Some(':'),
            _ => false,
        }
    }

    /// Format a specific frame number (or the path's own number when `None`)
    /// with this path's directory/base/extension.
    pub fn get(&self, number: Option<i64>, with_directory: bool) -> String {
        let mut out = String::new();
        if with_directory {
            out.push_str(&self.directory);
        }
        out.push_str(&self.base_name);
        match number {
            Some(n) => {
                if self.padding > 0 {
                    out.push_str(&format!("{:0width$}", n, width = self.padding));
                } else {
                    out.push_str(&n.to_string());
                }
            }
            None => out.push_str(&self.number),
        }
        out.push_str(&self.extension);
        out
    }

    /// Would `other` belong in the same sequence as `self` — same
    /// directory/base/extension and compatible zero-padding.
    pub fn sequences_with(&self, other: &Path) -> bool {
        !self.number.is_empty()
            && !other.number.is_empty()
            && self.directory == other.directory
            && self.base_name == other.base_name
            && self.extension == other.extension
            && (self.padding == other.padding || self.padding == digit_count(other.number_value))
    }

    pub fn to_sequence_string(&self) -> String {
        if self.is_sequence() {
            format!(
                "{}%0{}d{}",
                self.base_name,
                self.padding.max(1),
                self.extension,
            )
        } else {
            self.get(None, true)
        }
    }

    pub fn sequence_range_string(&self) -> String {
        if self.is_sequence() {
            format!(
                "{:0width$}-{:0width$}",
                self.sequence_min,
                self.sequence_max,
                width = self.padding.max(1),
            )
        } else {
            String::new()
        }
    }
}

fn digit_count(v: i64) -> usize {
    v.abs().to_string().len()
}

/// Scan a directory and group its entries into one [`Path`] per detected
/// sequence plus one per standalone file (spec §8 scenario 6).
pub fn list_sequences(dir: &str, options: &PathOptions) -> std::io::Result<Vec<Path>> {
    let mut entries: Vec<Path> = Vec::new();
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    names.sort();

    for name in names {
        let full = StdPath::new(dir).join(&name).to_string_lossy().into_owned();
        let parsed = Path::new(&full, options);
        if let Some(existing) = entries.iter_mut().find(|p: &&mut Path| p.sequences_with(&parsed)) {
            existing.sequence_min = existing.sequence_min.min(parsed.number_value);
            existing.sequence_max = existing.sequence_max.max(parsed.number_value);
        } else {
            entries.push(parsed);
        }
    }
    Ok(entries)
}

pub fn append_separator(value: &str) -> String {
    if value.is_empty() || is_path_separator(value.chars().last().unwrap()) {
        value.to_string()
    } else {
        let sep = if value.contains('\\') { '\\' } else { '/' };
        format!("{value}{sep}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base_number_extension() {
        let p = Path::new("/render/shot010.0042.exr", &PathOptions::default());
        assert_eq!(p.directory, "/render/");
        assert_eq!(p.base_name, "shot010.");
        assert_eq!(p.number, "0042");
        assert_eq!(p.number_value, 42);
        assert_eq!(p.padding, 4);
        assert_eq!(p.extension, ".exr");
    }

    #[test]
    fn non_sequence_file_has_no_number() {
        let p = Path::new("/render/readme.txt", &PathOptions::default());
        assert!(p.number.is_empty());
        assert_eq!(p.base_name, "readme");
    }

    #[test]
    fn windows_drive_letter_becomes_directory() {
        let p = Path::new("C:", &PathOptions::default());
        assert_eq!(p.directory, "C:");
        assert_eq!(p.base_name, "");
    }

    #[test]
    fn is_absolute_unix_and_windows() {
        let unix = Path::new("/a/b.ppm", &PathOptions::default());
        assert!(unix.is_absolute());
        let windows = Path::new("C:/a/b.ppm", &PathOptions::default());
        assert!(windows.is_absolute());
        let rel = Path::new("a/b.ppm", &PathOptions::default());
        assert!(!rel.is_absolute());
    }

    #[test]
    fn sequence_string_round_trip() {
        let mut p = Path::new("/r/shot.0010.exr", &PathOptions::default());
        p.sequence_max = 20;
        assert_eq!(p.to_sequence_string(), "shot.%04d.exr");
    }

    #[test]
    fn max_number_digits_bounds_the_number_scan() {
        let opts = PathOptions { max_number_digits: 2, negative_numbers: false };
        let p = Path::new("/r/shot12345.exr", &opts);
        // More digits than the bound: treated as part of the base name, not a number.
        assert!(p.number.is_empty());
    }
}
