//! Output file naming

use std::path::{Path, PathBuf};

use crate::domain::model::{MediaLocator, Sequence};

/// Extension used when the source has none
pub const DEFAULT_EXTENSION: &str = "mp4";

/// Lower-case `name`, turning every character that is not an ASCII letter
/// into a dot and collapsing runs of dots.
///
/// `"My Trip (2019)"` becomes `"my.trip."`.
pub fn prettify_file_name(name: &str) -> String {
    let mut pretty = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphabetic() {
            pretty.push(ch.to_ascii_lowercase());
        } else if !pretty.ends_with('.') {
            pretty.push('.');
        }
    }
    pretty
}

/// `<pretty stem>.<HH.MM.SS>.<seconds>[.<tag>].<ext>`
pub fn output_file_name(source: &MediaLocator, sequence: &Sequence, tag: Option<&str>) -> String {
    let stem = prettify_file_name(source.stem());
    let stem = stem.trim_end_matches('.');
    let extension = source.extension().unwrap_or(DEFAULT_EXTENSION);

    let mut name = String::new();
    if !stem.is_empty() {
        name.push_str(stem);
        name.push('.');
    }
    name.push_str(&sequence.start.to_file_stamp());
    name.push('.');
    name.push_str(&sequence.duration().seconds().to_string());
    if let Some(tag) = tag {
        name.push('.');
        name.push_str(tag);
    }
    name.push('.');
    name.push_str(extension);
    name
}

/// First path, starting with `path` itself, for which `is_taken` is false.
/// Candidates get `.1`, `.2`, ... inserted before the extension.
pub fn unique_path_with(path: &Path, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !is_taken(path) {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter: u32 = 1;
    loop {
        let file_name = match &extension {
            Some(ext) => format!("{}.{}.{}", stem, counter, ext),
            None => format!("{}.{}", stem, counter),
        };
        let candidate = path.with_file_name(file_name);
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// [`unique_path_with`] against the filesystem
pub fn unique_path(path: &Path) -> PathBuf {
    unique_path_with(path, Path::exists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Time;
    use std::collections::HashSet;
    use std::fs;

    #[test]
    fn test_prettify_file_name() {
        assert_eq!(prettify_file_name("My Trip (2019)"), "my.trip.");
        assert_eq!(prettify_file_name("__a__b__"), ".a.b.");
        assert_eq!(prettify_file_name("Été"), ".t.");
    }

    #[test]
    fn test_output_file_name() {
        let source = MediaLocator::new("/videos/Holiday Trip.mkv");
        let sequence = Sequence::new(Time::from_hms(0, 1, 5, 250), Time::from_hms(0, 1, 15, 900)).unwrap();
        assert_eq!(
            output_file_name(&source, &sequence, None),
            "holiday.trip.00.01.05.10.mkv"
        );
        assert_eq!(
            output_file_name(&source, &sequence, Some("rev")),
            "holiday.trip.00.01.05.10.rev.mkv"
        );
    }

    #[test]
    fn test_output_file_name_defaults_extension() {
        let source = MediaLocator::new("/videos/clip");
        let sequence = Sequence::new(Time::ZERO, Time::from_secs(3)).unwrap();
        assert_eq!(output_file_name(&source, &sequence, None), "clip.00.00.00.3.mp4");
    }

    #[test]
    fn test_unique_path_inserts_counter_before_extension() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.00.00.01.2.mp4");
        assert_eq!(unique_path(&first), first);

        fs::write(&first, b"x").unwrap();
        let second = unique_path(&first);
        assert_eq!(second, dir.path().join("a.00.00.01.2.1.mp4"));

        fs::write(&second, b"x").unwrap();
        assert_eq!(unique_path(&first), dir.path().join("a.00.00.01.2.2.mp4"));
    }

    #[test]
    fn test_unique_path_with_reserved_names() {
        let taken: HashSet<PathBuf> = [PathBuf::from("/out/x.mp4")].into_iter().collect();
        let path = unique_path_with(Path::new("/out/x.mp4"), |p| taken.contains(p));
        assert_eq!(path, PathBuf::from("/out/x.1.mp4"));
    }
}
