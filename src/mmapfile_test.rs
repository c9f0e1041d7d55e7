use super::*;

#[test]
fn test_create_sizes_file_to_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.nbrly");

    let holder = MappedFile::open(path.as_os_str(), 4096 * 4, Mode::Create).unwrap();
    assert_eq!(holder.capacity(), 4096 * 4);
    assert_eq!(fs::metadata(&path).unwrap().len(), 4096 * 4);
}

#[test]
fn test_write_read_back_through_view() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("b.nbrly");

    let holder = MappedFile::open(path.as_os_str(), 4096, Mode::Create).unwrap();
    holder.write_at(0, b"hello").unwrap();
    holder.flush_view().unwrap();
    holder.release_view();

    assert_eq!(holder.read_at(0, 5).unwrap(), b"hello");
}

#[test]
fn test_dispose_temporary_removes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.nbrly");

    let holder = MappedFile::open(path.as_os_str(), 4096, Mode::Temporary).unwrap();
    holder.dispose().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_dispose_non_temporary_keeps_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("d.nbrly");

    let holder = MappedFile::open(path.as_os_str(), 4096, Mode::Create).unwrap();
    holder.dispose().unwrap();
    assert!(path.exists());
}

#[test]
fn test_reset_recreates_view_after_release() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("e.nbrly");

    let holder = MappedFile::open(path.as_os_str(), 4096, Mode::Create).unwrap();
    holder.write_at(10, b"abc").unwrap();
    holder.release_view();
    holder.reset().unwrap();

    assert_eq!(holder.read_at(10, 3).unwrap(), b"abc");
}
