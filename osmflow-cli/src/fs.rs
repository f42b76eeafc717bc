//! Capability-based file helpers built on `cap-std` and `camino`.

use std::io;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8};

/// Open a UTF-8 file path for reading using ambient authority.
pub(crate) fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Create (or truncate) the file at `path` inside its existing parent directory.
pub(crate) fn create_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.create(name)
}

/// Return whether a path exists and is a regular file.
pub(crate) fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.metadata(name).map(|meta| meta.is_file())
}

fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, &str)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::other("path should include a file name"))?;
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use std::io::{Read, Write};
    use tempfile::TempDir;

    fn workspace(tmp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 temp dir")
    }

    #[rstest]
    fn created_files_can_be_reopened() {
        let tmp = TempDir::new().expect("tempdir");
        let path = workspace(&tmp).join("out.jsonl");
        let mut file = create_utf8_file(&path).expect("create file");
        file.write_all(b"{}\n").expect("write file");
        drop(file);

        assert!(file_is_file(&path).expect("inspect file"));
        let mut contents = String::new();
        open_utf8_file(&path)
            .expect("open file")
            .read_to_string(&mut contents)
            .expect("read file");
        assert_eq!(contents, "{}\n");
    }

    #[rstest]
    fn directories_are_not_files() {
        let tmp = TempDir::new().expect("tempdir");
        let root = workspace(&tmp);
        let nested = root.join("nested");
        std::fs::create_dir(&nested).expect("create dir");
        assert!(!file_is_file(&nested).expect("inspect dir"));
    }

    #[rstest]
    fn missing_files_surface_not_found() {
        let tmp = TempDir::new().expect("tempdir");
        let err = file_is_file(&workspace(&tmp).join("absent.jsonl")).expect_err("missing file");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
