//! Pack-then-unpack coverage across every supported format.

use std::fs;
use std::path::{Path, PathBuf};

use omnipack::{ArchiveOptions, Archiver, CompressionLevel, EntryKind};

fn sample_tree(root: &Path) -> PathBuf {
    let src = root.join("src");
    fs::create_dir_all(src.join("sub")).unwrap();
    fs::write(src.join("a.txt"), b"hello").unwrap();
    fs::write(src.join("sub/b.txt"), b"world!").unwrap();
    src
}

fn assert_tree_restored(out: &Path) {
    assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"hello");
    assert_eq!(fs::read(out.join("sub/b.txt")).unwrap(), b"world!");
}

#[test]
fn zip_directory_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let src = sample_tree(dir.path());
    let archive = dir.path().join("tree.zip");
    let out = dir.path().join("out");

    let archiver = Archiver::new();
    let packed = archiver
        .pack(&src, &archive, &ArchiveOptions::default())
        .unwrap();
    assert_eq!(packed.count_of(EntryKind::File), 2);

    let unpacked = archiver
        .unpack(&archive, &out, &ArchiveOptions::default())
        .unwrap();
    assert_eq!(unpacked.count_of(EntryKind::File), 2);
    assert_tree_restored(&out);
}

#[test]
fn tar_directory_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let src = sample_tree(dir.path());
    let archive = dir.path().join("tree.tar");
    let out = dir.path().join("out");

    let archiver = Archiver::new();
    archiver
        .pack(&src, &archive, &ArchiveOptions::default())
        .unwrap();
    let unpacked = archiver
        .unpack(&archive, &out, &ArchiveOptions::default())
        .unwrap();
    assert_eq!(unpacked.count_of(EntryKind::File), 2);
    assert_tree_restored(&out);
}

#[test]
fn tar_gz_directory_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let src = sample_tree(dir.path());
    let archive = dir.path().join("tree.tar.gz");
    let out = dir.path().join("out");

    let archiver = Archiver::new();
    archiver
        .pack(&src, &archive, &ArchiveOptions::default())
        .unwrap();
    let unpacked = archiver
        .unpack(&archive, &out, &ArchiveOptions::default())
        .unwrap();
    assert_eq!(unpacked.count_of(EntryKind::File), 2);
    assert_tree_restored(&out);
}

#[test]
fn gzip_single_file_roundtrip_restores_recorded_name() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("notes.txt");
    fs::write(&src, b"gzip keeps my name").unwrap();
    let archive = dir.path().join("anything.gz");
    let out = dir.path().join("out");

    let archiver = Archiver::new();
    archiver
        .pack(&src, &archive, &ArchiveOptions::default())
        .unwrap();
    let unpacked = archiver
        .unpack(&archive, &out, &ArchiveOptions::default())
        .unwrap();
    assert_eq!(unpacked.entry_count(), 1);
    // The output name comes from the GZIP name header, not the archive name.
    assert_eq!(fs::read(out.join("notes.txt")).unwrap(), b"gzip keeps my name");
}

#[test]
fn zlib_single_file_roundtrip_derives_name_from_archive() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("data.txt");
    fs::write(&src, b"zlib has no header name").unwrap();
    let archive = dir.path().join("data.txt.zz");
    let out = dir.path().join("out");

    let archiver = Archiver::new();
    archiver
        .pack(&src, &archive, &ArchiveOptions::default())
        .unwrap();
    archiver
        .unpack(&archive, &out, &ArchiveOptions::default())
        .unwrap();
    assert_eq!(
        fs::read(out.join("data.txt")).unwrap(),
        b"zlib has no header name"
    );
}

#[test]
fn bzip2_archive_can_be_unpacked() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("report.txt.bz2");
    let mut encoder =
        bzip2::write::BzEncoder::new(fs::File::create(&archive).unwrap(), bzip2::Compression::default());
    encoder.write_all(b"bzip2 payload").unwrap();
    encoder.finish().unwrap();

    let out = dir.path().join("out");
    let archiver = Archiver::new();
    let unpacked = archiver
        .unpack(&archive, &out, &ArchiveOptions::default())
        .unwrap();
    assert_eq!(unpacked.entry_count(), 1);
    assert_eq!(fs::read(out.join("report.txt")).unwrap(), b"bzip2 payload");
}

#[test]
fn empty_file_roundtrips_through_zip_and_gzip() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("empty.bin");
    fs::write(&src, b"").unwrap();
    let archiver = Archiver::new();

    for (archive, out) in [
        (dir.path().join("empty.zip"), dir.path().join("out_zip")),
        (dir.path().join("empty.bin.gz"), dir.path().join("out_gz")),
    ] {
        archiver
            .pack(&src, &archive, &ArchiveOptions::default())
            .unwrap();
        archiver
            .unpack(&archive, &out, &ArchiveOptions::default())
            .unwrap();
        assert_eq!(fs::read(out.join("empty.bin")).unwrap(), b"");
    }
}

#[test]
fn compression_levels_all_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let src = sample_tree(dir.path());
    let archiver = Archiver::new();

    let levels = [
        CompressionLevel::None,
        CompressionLevel::Fast,
        CompressionLevel::Default,
        CompressionLevel::Best,
        CompressionLevel::HuffmanOnly,
    ];
    for (i, level) in levels.into_iter().enumerate() {
        let archive = dir.path().join(format!("tree-{i}.zip"));
        let out = dir.path().join(format!("out-{i}"));
        let options = ArchiveOptions {
            level,
            ..ArchiveOptions::default()
        };
        Archiver::new().pack(&src, &archive, &options).unwrap();
        archiver
            .unpack(&archive, &out, &ArchiveOptions::default())
            .unwrap();
        assert_tree_restored(&out);
    }
}

#[cfg(unix)]
#[test]
fn tar_roundtrip_preserves_symlinks_and_modes() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let src = sample_tree(dir.path());
    fs::set_permissions(src.join("a.txt"), fs::Permissions::from_mode(0o640)).unwrap();
    std::os::unix::fs::symlink("a.txt", src.join("link-to-a")).unwrap();

    let archive = dir.path().join("tree.tar");
    let out = dir.path().join("out");
    let archiver = Archiver::new();
    archiver
        .pack(&src, &archive, &ArchiveOptions::default())
        .unwrap();
    let unpacked = archiver
        .unpack(&archive, &out, &ArchiveOptions::default())
        .unwrap();

    assert_eq!(unpacked.count_of(EntryKind::Symlink), 1);
    let target = fs::read_link(out.join("link-to-a")).unwrap();
    assert_eq!(target, PathBuf::from("a.txt"));
    let mode = fs::metadata(out.join("a.txt")).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o640);
}

#[test]
fn tar_hardlink_extraction_links_inside_the_target() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("links.tar");
    let mut builder = tar::Builder::new(fs::File::create(&archive).unwrap());
    let mut header = tar::Header::new_gnu();
    header.set_size(7);
    header.set_mode(0o644);
    builder
        .append_data(&mut header, "a.txt", &b"payload"[..])
        .unwrap();
    let mut link = tar::Header::new_gnu();
    link.set_size(0);
    link.set_mode(0o644);
    link.set_entry_type(tar::EntryType::Link);
    builder.append_link(&mut link, "b.txt", "a.txt").unwrap();
    builder.into_inner().unwrap();

    let out = dir.path().join("out");
    let unpacked = Archiver::new()
        .unpack(&archive, &out, &ArchiveOptions::default())
        .unwrap();
    assert_eq!(unpacked.count_of(EntryKind::Hardlink), 1);
    assert_eq!(fs::read(out.join("b.txt")).unwrap(), b"payload");
}

#[test]
fn pack_respects_the_filter() {
    use omnipack::PackFilter;

    struct TextOnly;
    impl PackFilter for TextOnly {
        fn include(&self, path: &Path, _size: u64, is_dir: bool) -> bool {
            is_dir || path.extension().map(|e| e == "txt").unwrap_or(false)
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let src = sample_tree(dir.path());
    fs::write(src.join("skipped.log"), b"noise").unwrap();

    let archive = dir.path().join("tree.zip");
    let archiver = Archiver::new();
    let packed = archiver
        .pack_with(
            &src,
            &archive,
            &ArchiveOptions::default(),
            &omnipack::NullProgress,
            &TextOnly,
        )
        .unwrap();
    assert_eq!(packed.count_of(EntryKind::File), 2);
}
