use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ferrite_fs_abstraction::{
    ErrorKind, File, FileSystem, Finalizer, FsError, OpenFlags, Timestamp,
};
use ferrite_fs_ramfs::{RamFs, DIR_SIZE, EMPTY_FILE_SIZE};

fn nop() -> Finalizer {
    Box::new(|| {})
}

fn open(fs: &RamFs, name: &str, flags: OpenFlags) -> Result<Box<dyn File>, FsError> {
    fs.open_with_finalizer(name, flags, 0, nop())
}

fn open_err(fs: &RamFs, name: &str, flags: OpenFlags) -> ErrorKind {
    match open(fs, name, flags) {
        Ok(_) => panic!("open {name} unexpectedly succeeded"),
        Err(e) => e.kind().expect("unexpected eof from open"),
    }
}

fn kind(err: FsError) -> ErrorKind {
    err.kind().expect("unexpected eof")
}

fn check_read(f: &dyn File, expect: &[u8]) {
    let mut buf = vec![0u8; expect.len()];
    let n = f.read(&mut buf).expect("read failed");
    assert_eq!(&buf[..n], expect);
}

fn check_usage(fs: &RamFs, items: i64, used: u64, max: u64) {
    let u = fs.usage();
    assert_eq!(
        (u.used_items, u.max_items, u.used_bytes, u.max_bytes),
        (items, -1, used as i64, max as i64)
    );
}

#[test]
fn create_write_read_cycle() {
    const MAX: u64 = 1024;
    let fs = RamFs::new(MAX);
    let data = b"test1234\n";

    assert_eq!(
        open_err(&fs, "a.txt", OpenFlags::RDONLY),
        ErrorKind::NotFound
    );

    let f = open(&fs, "a.txt", OpenFlags::CREAT).unwrap();
    assert_eq!(
        kind(f.write(b"test\n").unwrap_err()),
        ErrorKind::NotSupported
    );
    f.close().unwrap();

    check_usage(&fs, 1, EMPTY_FILE_SIZE, MAX);

    assert_eq!(
        open_err(&fs, "a.txt", OpenFlags::CREAT | OpenFlags::EXCL),
        ErrorKind::AlreadyExists
    );

    let f = open(&fs, "a.txt", OpenFlags::WRONLY).unwrap();
    assert_eq!(f.write(data).unwrap(), data.len());
    assert_eq!(f.write(data).unwrap(), data.len());
    f.close().unwrap();

    // 18 bytes of content occupy a 32-byte accounted capacity (16-byte
    // growth steps below 64).
    check_usage(&fs, 1, EMPTY_FILE_SIZE + 32, MAX);

    let f = open(&fs, "a.txt", OpenFlags::RDONLY).unwrap();
    check_read(f.as_ref(), data);
    check_read(f.as_ref(), data);
    let mut buf = [0u8; 100];
    assert!(f.read(&mut buf).unwrap_err().is_eof());
    f.close().unwrap();

    // Overwriting from the start neither grows nor shrinks the file.
    let f = open(&fs, "a.txt", OpenFlags::WRONLY).unwrap();
    assert_eq!(f.write(data).unwrap(), data.len());
    f.close().unwrap();

    check_usage(&fs, 1, EMPTY_FILE_SIZE + 32, MAX);

    fs.mkdir("D", 0).unwrap();

    check_usage(&fs, 2, EMPTY_FILE_SIZE + 32 + DIR_SIZE, MAX);

    fs.rename("a.txt", "D/b.txt").unwrap();

    check_usage(&fs, 2, EMPTY_FILE_SIZE + 32 + DIR_SIZE, MAX);

    let f = open(&fs, "D/b.txt", OpenFlags::RDONLY).unwrap();
    let fi = f.stat().unwrap();
    f.close().unwrap();
    assert_eq!(fi.name, "b.txt");
    assert_eq!(fi.size, 2 * data.len() as u64);
    assert!(!fi.is_dir());

    assert_eq!(kind(fs.remove("a.txt").unwrap_err()), ErrorKind::NotFound);
    fs.remove("D/b.txt").unwrap();

    check_usage(&fs, 1, DIR_SIZE, MAX);
}

#[test]
fn root_special_cases() {
    let fs = RamFs::new(1024);
    assert_eq!(
        open_err(&fs, ".", OpenFlags::CREAT),
        ErrorKind::NotSupported
    );
    assert_eq!(kind(fs.remove(".").unwrap_err()), ErrorKind::NotSupported);
    assert_eq!(kind(fs.mkdir(".", 0).unwrap_err()), ErrorKind::AlreadyExists);

    let root = open(&fs, ".", OpenFlags::RDONLY).unwrap();
    let fi = root.stat().unwrap();
    assert_eq!(fi.name, ".");
    assert!(fi.is_dir());
    root.close().unwrap();
}

#[test]
fn invalid_paths() {
    let fs = RamFs::new(1024);
    for bad in ["", "/abs", "a/", "a//b", "a/../b"] {
        assert_eq!(open_err(&fs, bad, OpenFlags::RDONLY), ErrorKind::Invalid);
        assert_eq!(kind(fs.mkdir(bad, 0).unwrap_err()), ErrorKind::Invalid);
        assert_eq!(kind(fs.remove(bad).unwrap_err()), ErrorKind::Invalid);
    }
}

#[test]
fn traversal_through_file_names_the_culprit() {
    let fs = RamFs::new(1024);
    open(&fs, "f", OpenFlags::CREAT).unwrap().close().unwrap();
    match open(&fs, "f/x", OpenFlags::RDONLY) {
        Err(FsError::Path(e)) => {
            assert_eq!(e.kind, ErrorKind::NotADirectory);
            assert_eq!(e.path, "f");
        }
        other => panic!("expected ENOTDIR, got {:?}", other.map(|_| ())),
    }
    // Missing parent directory reports ENOENT.
    assert_eq!(open_err(&fs, "no/y", OpenFlags::CREAT), ErrorKind::NotFound);
    assert_eq!(kind(fs.mkdir("no/y", 0).unwrap_err()), ErrorKind::NotFound);
}

#[test]
fn mkdir_checks_existing_sibling() {
    let fs = RamFs::new(1024);
    fs.mkdir("D", 0).unwrap();
    assert_eq!(kind(fs.mkdir("D", 0).unwrap_err()), ErrorKind::AlreadyExists);
    open(&fs, "f", OpenFlags::CREAT).unwrap().close().unwrap();
    assert_eq!(kind(fs.mkdir("f", 0).unwrap_err()), ErrorKind::AlreadyExists);
}

#[test]
fn directory_enumeration() {
    let fs = RamFs::new(4096);
    for name in ["b.txt", "a.txt", "c.txt"] {
        open(&fs, name, OpenFlags::CREAT).unwrap().close().unwrap();
    }
    fs.mkdir("sub", 0).unwrap();

    let root = open(&fs, ".", OpenFlags::RDONLY).unwrap();
    let first = root.read_dir(2).unwrap();
    assert_eq!(first.len(), 2);
    let rest = root.read_dir(0).unwrap();
    assert_eq!(rest.len(), 2);
    let names: Vec<_> = first.iter().chain(&rest).map(|e| e.name.clone()).collect();
    assert_eq!(names, ["a.txt", "b.txt", "c.txt", "sub"]);
    assert!(root.read_dir(0).unwrap_err().is_eof());
    root.close().unwrap();

    // Reading a directory handle as a byte stream is unsupported.
    let sub = open(&fs, "sub", OpenFlags::RDONLY).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(kind(sub.read(&mut buf).unwrap_err()), ErrorKind::NotSupported);
    sub.close().unwrap();

    // Opening a directory for writing is refused up front.
    assert_eq!(open_err(&fs, "sub", OpenFlags::WRONLY), ErrorKind::IsADirectory);
    assert_eq!(open_err(&fs, "sub", OpenFlags::TRUNC), ErrorKind::IsADirectory);
}

#[test]
fn append_and_truncate() {
    let fs = RamFs::new(1024);
    let f = open(&fs, "log", OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
    f.write(b"hello").unwrap();
    f.close().unwrap();

    let f = open(&fs, "log", OpenFlags::WRONLY | OpenFlags::APPEND).unwrap();
    f.write(b"!").unwrap();
    f.close().unwrap();

    let f = open(&fs, "log", OpenFlags::RDONLY).unwrap();
    check_read(f.as_ref(), b"hello!");
    f.close().unwrap();

    let used_before = fs.usage().used_bytes;
    let f = open(&fs, "log", OpenFlags::RDWR | OpenFlags::TRUNC).unwrap();
    let mut buf = [0u8; 8];
    assert!(f.read(&mut buf).unwrap_err().is_eof());
    f.write(b"hi").unwrap();
    f.close().unwrap();
    // Truncation keeps the accounted capacity.
    assert_eq!(fs.usage().used_bytes, used_before);

    let f = open(&fs, "log", OpenFlags::RDONLY).unwrap();
    check_read(f.as_ref(), b"hi");
    f.close().unwrap();
}

#[test]
fn positional_io_leaves_the_cursor_alone() {
    let fs = RamFs::new(1024);
    let f = open(&fs, "f", OpenFlags::CREAT | OpenFlags::RDWR).unwrap();
    f.write(b"0123456789").unwrap();

    f.write_at(b"AB", 2).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(f.read_at(&mut buf, 1).unwrap(), 4);
    assert_eq!(&buf, b"1AB4");

    // A positional write past the end zero-fills the gap.
    f.write_at(b"Z", 12).unwrap();
    assert!(f.read_at(&mut buf, 13).unwrap_err().is_eof());

    // The sequential cursor still sits where `write` left it.
    f.write(b"X").unwrap();
    let mut tail = [0u8; 3];
    assert_eq!(f.read_at(&mut tail, 10).unwrap(), 3);
    assert_eq!(&tail, b"X\0Z");
    f.close().unwrap();
}

#[test]
fn quota_exhaustion_rolls_back() {
    let fs = RamFs::new(EMPTY_FILE_SIZE + 16);
    let f = open(&fs, "f", OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
    check_usage(&fs, 1, EMPTY_FILE_SIZE, EMPTY_FILE_SIZE + 16);

    // 17 bytes need a 32-byte capacity: over the bound, charge rolled back.
    let big = [0u8; 17];
    assert_eq!(kind(f.write(&big).unwrap_err()), ErrorKind::NoSpace);
    check_usage(&fs, 1, EMPTY_FILE_SIZE, EMPTY_FILE_SIZE + 16);

    assert_eq!(f.write(b"0123456789").unwrap(), 10);
    check_usage(&fs, 1, EMPTY_FILE_SIZE + 16, EMPTY_FILE_SIZE + 16);

    assert_eq!(kind(f.write(&big).unwrap_err()), ErrorKind::NoSpace);
    check_usage(&fs, 1, EMPTY_FILE_SIZE + 16, EMPTY_FILE_SIZE + 16);
    f.close().unwrap();

    // A full volume still opens existing files.
    let f = open(&fs, "f", OpenFlags::RDONLY).unwrap();
    check_read(f.as_ref(), b"0123456789");
    f.close().unwrap();
}

#[test]
fn rename_guards() {
    let fs = RamFs::new(4096);
    fs.mkdir("D", 0).unwrap();
    open(&fs, "a", OpenFlags::CREAT).unwrap().close().unwrap();
    open(&fs, "D/b", OpenFlags::CREAT).unwrap().close().unwrap();

    assert_eq!(kind(fs.rename("nope", "x").unwrap_err()), ErrorKind::NotFound);
    assert_eq!(
        kind(fs.rename("a", "D/b").unwrap_err()),
        ErrorKind::AlreadyExists
    );
    assert_eq!(kind(fs.rename("a", "no/x").unwrap_err()), ErrorKind::NotFound);
    assert_eq!(kind(fs.rename("D", "D/sub").unwrap_err()), ErrorKind::Invalid);
    assert_eq!(kind(fs.rename("a", ".").unwrap_err()), ErrorKind::Invalid);

    // Same-directory rename, then across directories.
    fs.rename("a", "a2").unwrap();
    fs.rename("a2", "D/a3").unwrap();
    assert_eq!(open_err(&fs, "a2", OpenFlags::RDONLY), ErrorKind::NotFound);
    open(&fs, "D/a3", OpenFlags::RDONLY).unwrap().close().unwrap();

    // Renaming is a no-op when both names are equal.
    fs.rename("D/a3", "D/a3").unwrap();
}

#[test]
fn remove_refuses_populated_directory() {
    let fs = RamFs::new(4096);
    fs.mkdir("D", 0).unwrap();
    open(&fs, "D/f", OpenFlags::CREAT).unwrap().close().unwrap();
    assert_eq!(kind(fs.remove("D").unwrap_err()), ErrorKind::NotSupported);
    fs.remove("D/f").unwrap();
    fs.remove("D").unwrap();
    check_usage(&fs, 0, 0, 4096);
    assert_eq!(kind(fs.remove("D").unwrap_err()), ErrorKind::NotFound);
}

#[test]
fn close_is_terminal() {
    let fs = RamFs::new(1024);
    let f = open(&fs, "f", OpenFlags::CREAT | OpenFlags::RDWR).unwrap();
    f.write(b"x").unwrap();
    f.close().unwrap();
    assert_eq!(kind(f.close().unwrap_err()), ErrorKind::BadHandle);
    let mut buf = [0u8; 1];
    assert_eq!(kind(f.read(&mut buf).unwrap_err()), ErrorKind::BadHandle);
    assert_eq!(kind(f.write(b"y").unwrap_err()), ErrorKind::BadHandle);
    assert_eq!(kind(f.stat().unwrap_err()), ErrorKind::BadHandle);
}

#[test]
fn finalizer_runs_exactly_once() {
    let fs = RamFs::new(1024);
    let count = Arc::new(AtomicUsize::new(0));

    let c = count.clone();
    let f = fs
        .open_with_finalizer(
            "f",
            OpenFlags::CREAT,
            0,
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
    f.close().unwrap();
    let _ = f.close();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    // A failed open never runs the finalizer.
    let c = count.clone();
    let err = fs.open_with_finalizer(
        "missing",
        OpenFlags::RDONLY,
        0,
        Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert!(err.is_err());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn modification_time_uses_the_clock() {
    let fs = RamFs::new(1024).with_clock(|| Timestamp::from_secs(1_700_000_000));
    let f = open(&fs, "f", OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
    f.write(b"x").unwrap();
    let fi = f.stat().unwrap();
    f.close().unwrap();
    assert_eq!(fi.mtime, Timestamp::from_secs(1_700_000_000));
}

#[test]
fn concurrent_writer_and_reader_agree() {
    let fs = RamFs::new(64 * 1024);
    open(&fs, "shared", OpenFlags::CREAT)
        .unwrap()
        .close()
        .unwrap();

    const CHUNK: &[u8] = b"0123456789";
    const CHUNKS: usize = 200;

    let writer_fs = fs.clone();
    let writer = std::thread::spawn(move || {
        let f = open(&writer_fs, "shared", OpenFlags::WRONLY).unwrap();
        for _ in 0..CHUNKS {
            assert_eq!(f.write(CHUNK).unwrap(), CHUNK.len());
        }
        f.close().unwrap();
    });

    let f = open(&fs, "shared", OpenFlags::RDONLY).unwrap();
    let mut seen = Vec::new();
    let mut spins = 0usize;
    while seen.len() < CHUNK.len() * CHUNKS {
        let mut buf = [0u8; 64];
        match f.read(&mut buf) {
            Ok(n) => seen.extend_from_slice(&buf[..n]),
            Err(e) => {
                assert!(e.is_eof(), "reader failed: {e}");
                spins += 1;
                assert!(spins < 10_000_000, "writer made no progress");
                std::thread::yield_now();
            }
        }
    }
    f.close().unwrap();
    writer.join().unwrap();

    // The reader observed a prefix of the write serialisation at every
    // step, so the final content is the chunk sequence.
    for (i, byte) in seen.iter().enumerate() {
        assert_eq!(*byte, CHUNK[i % CHUNK.len()]);
    }

    let u = fs.usage();
    assert!(u.used_bytes >= 0 && u.used_bytes <= u.max_bytes);
}
