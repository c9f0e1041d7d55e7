use super::*;

#[test]
fn test_create_open_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.dat");
    let os = path.as_os_str();

    let mut fd = create_file_a(os).unwrap();
    sync_write(&mut fd, b"hello").unwrap();
    drop(fd);

    let mut fd = open_file_r(os).unwrap();
    let buf = read_file!(fd, std::io::SeekFrom::Start(0), 5u64, "test read").unwrap();
    assert_eq!(&buf, b"hello");
}

#[test]
fn test_allocate_sparse_sets_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("b.dat");
    let mut fd = create_file_a(path.as_os_str()).unwrap();

    allocate_sparse(&mut fd, 4096 * 10).unwrap();
    assert_eq!(fd.metadata().unwrap().len(), 4096 * 10);
}
