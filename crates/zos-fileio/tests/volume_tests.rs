//! File access layer integration tests
//!
//! Drive a volume through its public surface on top of the in-memory engine
//! and disk, checking the mount lifecycle from the outside.

use std::sync::Mutex;

use zos_fileio::core::{decode_volume_label, FILE_INFO_SIZE};
use zos_fileio::{
    AccessMode, DeleteOutcome, DriverConfig, FileAttributes, FileError, FileHandle, FileInfo,
    FileSystemInfo, Guid, IoToken, MemoryDisk, MemoryEngine, OpenMode, Volume, VolumeRegistry,
    END_OF_FILE,
};

// ============================================================================
// Log capture
// ============================================================================

struct CaptureLogger {
    lines: Mutex<Vec<String>>,
}

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(format!("{} {}", record.level(), record.args()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    lines: Mutex::new(Vec::new()),
};

fn init_logging() {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Trace);
}

fn logged(needle: &str) -> bool {
    LOGGER
        .lines
        .lock()
        .map(|lines| lines.iter().any(|l| l.contains(needle)))
        .unwrap_or(false)
}

// ============================================================================
// Helpers
// ============================================================================

const RW: OpenMode = OpenMode::READ.union(OpenMode::WRITE);
const CREATE_RW: OpenMode = OpenMode::all();

type MemVolume = Volume<MemoryEngine, MemoryDisk>;

fn volume(engine: MemoryEngine) -> MemVolume {
    Volume::new(engine, MemoryDisk::ntfs(512, 64), DriverConfig::default())
}

fn read_only_volume(engine: MemoryEngine) -> MemVolume {
    Volume::new(
        engine,
        MemoryDisk::ntfs(512, 64),
        DriverConfig::default().with_force_read_only(true),
    )
}

fn file_info(vol: &MemVolume, handle: FileHandle) -> FileInfo {
    let mut buf = [0u8; 1024];
    let len = vol.get_info(handle, &Guid::FILE_INFO, &mut buf).unwrap();
    FileInfo::decode(&buf[..len]).unwrap()
}

fn list_dir(vol: &mut MemVolume, dir: FileHandle) -> Vec<String> {
    let mut names = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let len = vol.read(dir, &mut buf).unwrap();
        if len == 0 {
            break;
        }
        names.push(FileInfo::decode(&buf[..len]).unwrap().file_name);
    }
    names
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_end_to_end_scenario() {
    init_logging();
    let mut vol = volume(MemoryEngine::new());
    assert!(!vol.is_mounted());

    let root = vol.open_volume().unwrap();
    assert!(vol.is_mounted());
    assert_eq!(vol.engine().mount_count(), 1);

    let file = vol
        .open(root, "notes.txt", CREATE_RW, FileAttributes::empty())
        .unwrap();
    assert_eq!(vol.total_ref_count(), 2);

    assert_eq!(vol.write(file, b"hello, world"), Ok(12));
    vol.set_position(file, 0).unwrap();
    let mut buf = [0u8; 12];
    assert_eq!(vol.read(file, &mut buf), Ok(12));
    assert_eq!(&buf, b"hello, world");

    vol.close(file).unwrap();
    assert!(vol.is_mounted());
    vol.close(root).unwrap();

    assert_eq!(vol.total_ref_count(), 0);
    assert!(!vol.is_mounted());
    assert_eq!(vol.engine().unmount_count(), 1);
    assert_eq!(vol.engine().open_node_count(), 0);
    assert_eq!(vol.open_files(), 0);
    assert_eq!(vol.engine().contents("/notes.txt"), Some(&b"hello, world"[..]));
}

#[test]
fn test_remount_after_unmount() {
    let mut vol = volume(MemoryEngine::new());
    let root = vol.open_volume().unwrap();
    vol.close(root).unwrap();

    let root = vol.open_volume().unwrap();
    assert!(vol.is_mounted());
    assert_eq!(vol.engine().mount_count(), 2);
    vol.close(root).unwrap();
    assert_eq!(vol.engine().unmount_count(), 2);
}

#[test]
fn test_open_volume_twice_shares_root() {
    let mut vol = volume(MemoryEngine::new());
    let first = vol.open_volume().unwrap();
    let second = vol.open_volume().unwrap();

    assert_eq!(first.file(), second.file());
    assert_eq!(first.mode(), AccessMode::ReadWrite);
    assert_eq!(vol.file(first).unwrap().ref_count(), 2);
    assert_eq!(vol.engine().mount_count(), 1);

    vol.close(first).unwrap();
    assert!(vol.is_mounted());
    vol.close(second).unwrap();
    assert!(!vol.is_mounted());
}

#[test]
fn test_mount_failure() {
    let mut engine = MemoryEngine::new();
    engine.set_mount_failure(Some(FileError::VolumeCorrupted));
    let mut vol = volume(engine);

    assert_eq!(vol.open_volume(), Err(FileError::VolumeCorrupted));
    assert!(!vol.is_mounted());
    assert_eq!(vol.total_ref_count(), 0);
    assert_eq!(vol.open_files(), 0);

    vol.engine_mut().set_mount_failure(None);
    let root = vol.open_volume().unwrap();
    assert!(vol.is_mounted());
    vol.close(root).unwrap();
}

#[test]
fn test_label_and_serial_captured_at_mount() {
    let mut vol = volume(MemoryEngine::new().with_label("BOOT"));
    assert_eq!(vol.label(), None);

    let root = vol.open_volume().unwrap();
    assert_eq!(vol.label(), Some("BOOT"));
    assert_eq!(vol.serial(), 0x1234_5678_9abc_def0);
    vol.close(root).unwrap();
}

// ============================================================================
// Open
// ============================================================================

#[test]
fn test_dual_mode_handles_share_one_object() {
    let mut vol = volume(MemoryEngine::new().with_file("/data.bin", b"abc"));
    let root = vol.open_volume().unwrap();

    let writer = vol
        .open(root, "data.bin", RW, FileAttributes::empty())
        .unwrap();
    let reader = vol
        .open(root, "data.bin", OpenMode::READ, FileAttributes::empty())
        .unwrap();

    assert_eq!(writer.file(), reader.file());
    assert_eq!(writer.mode(), AccessMode::ReadWrite);
    assert_eq!(reader.mode(), AccessMode::ReadOnly);
    assert_eq!(vol.file(reader).unwrap().ref_count(), 2);
    // root and data.bin, each opened once by the engine
    assert_eq!(vol.engine().open_node_count(), 2);

    assert_eq!(vol.write(reader, b"x"), Err(FileError::AccessDenied));
    assert_eq!(vol.write(writer, b"x"), Ok(1));

    vol.close(reader).unwrap();
    assert_eq!(vol.file(writer).unwrap().ref_count(), 1);
    vol.close(writer).unwrap();
    vol.close(root).unwrap();
    assert!(!vol.is_mounted());
}

#[test]
fn test_reopen_self() {
    let mut vol = volume(MemoryEngine::new().with_dir("/docs"));
    let root = vol.open_volume().unwrap();
    let docs = vol.open(root, "docs", RW, FileAttributes::empty()).unwrap();

    let again = vol.open(docs, ".", OpenMode::READ, FileAttributes::empty()).unwrap();
    assert_eq!(again.file(), docs.file());
    assert!(again.is_read_only());
    assert_eq!(vol.file(docs).unwrap().ref_count(), 2);

    let empty = vol.open(docs, "", RW, FileAttributes::empty()).unwrap();
    assert_eq!(empty.file(), docs.file());
    assert_eq!(vol.total_ref_count(), 4);

    for h in [empty, again, docs, root] {
        vol.close(h).unwrap();
    }
    assert!(!vol.is_mounted());
}

#[test]
fn test_open_path_forms() {
    let mut vol = volume(MemoryEngine::new().with_file("/a/b/c.txt", b""));
    let root = vol.open_volume().unwrap();
    let a = vol.open(root, "a", OpenMode::READ, FileAttributes::empty()).unwrap();

    let c = vol
        .open(a, "b\\c.txt", OpenMode::READ, FileAttributes::empty())
        .unwrap();
    assert_eq!(vol.file(c).unwrap().path(), "/a/b/c.txt");
    assert_eq!(vol.file(c).unwrap().base_name(), "c.txt");

    let same = vol
        .open(a, "/a/./b/../b/c.txt", OpenMode::READ, FileAttributes::empty())
        .unwrap();
    assert_eq!(same.file(), c.file());

    let up = vol.open(a, "..", OpenMode::READ, FileAttributes::empty()).unwrap();
    assert_eq!(up.file(), root.file());
}

#[test]
fn test_open_rejections() {
    let mut vol = volume(MemoryEngine::new().with_file("/f.txt", b""));
    let root = vol.open_volume().unwrap();
    let file = vol.open(root, "f.txt", OpenMode::READ, FileAttributes::empty()).unwrap();
    let refs = vol.total_ref_count();

    assert_eq!(
        vol.open(root, "..", OpenMode::READ, FileAttributes::empty()),
        Err(FileError::NotFound)
    );
    assert_eq!(
        vol.open(file, "x", OpenMode::READ, FileAttributes::empty()),
        Err(FileError::NotFound)
    );
    assert_eq!(
        vol.open(root, "x", OpenMode::WRITE, FileAttributes::empty()),
        Err(FileError::InvalidParameter)
    );
    assert_eq!(
        vol.open(root, "x", OpenMode::CREATE | OpenMode::READ, FileAttributes::empty()),
        Err(FileError::InvalidParameter)
    );
    assert_eq!(
        vol.open(root, ".", CREATE_RW, FileAttributes::empty()),
        Err(FileError::AccessDenied)
    );
    assert_eq!(
        vol.open(root, "missing", OpenMode::READ, FileAttributes::empty()),
        Err(FileError::NotFound)
    );
    assert_eq!(
        vol.open(root, "bad\0name", OpenMode::READ, FileAttributes::empty()),
        Err(FileError::InvalidParameter)
    );

    assert_eq!(vol.total_ref_count(), refs);
    assert_eq!(vol.open_files(), 2);
}

#[test]
fn test_create_directory() {
    let mut vol = volume(MemoryEngine::new());
    let root = vol.open_volume().unwrap();
    let dir = vol
        .open(root, "logs", CREATE_RW, FileAttributes::DIRECTORY)
        .unwrap();
    assert!(vol.file(dir).unwrap().is_directory());

    let log = vol
        .open(dir, "boot.log", CREATE_RW, FileAttributes::empty())
        .unwrap();
    assert!(!vol.file(log).unwrap().is_directory());
    assert!(vol.engine().exists("/logs/boot.log"));
}

#[test]
fn test_out_of_resources_rolls_back() {
    let config = DriverConfig::default().with_max_open_files(2);
    let mut vol = Volume::new(
        MemoryEngine::new().with_file("/a", b"").with_file("/b", b""),
        MemoryDisk::ntfs(512, 64),
        config,
    );
    let root = vol.open_volume().unwrap();
    let a = vol.open(root, "a", OpenMode::READ, FileAttributes::empty()).unwrap();

    assert_eq!(
        vol.open(root, "b", OpenMode::READ, FileAttributes::empty()),
        Err(FileError::OutOfResources)
    );
    assert_eq!(vol.total_ref_count(), 2);
    assert_eq!(vol.open_files(), 2);
    assert_eq!(vol.engine().open_node_count(), 2);

    vol.close(a).unwrap();
    let b = vol.open(root, "b", OpenMode::READ, FileAttributes::empty()).unwrap();
    vol.close(b).unwrap();
    vol.close(root).unwrap();
    assert!(!vol.is_mounted());
}

#[test]
fn test_stale_handle() {
    let mut vol = volume(MemoryEngine::new().with_file("/f", b"abc"));
    let root = vol.open_volume().unwrap();
    let file = vol.open(root, "f", OpenMode::READ, FileAttributes::empty()).unwrap();
    vol.close(file).unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(vol.read(file, &mut buf), Err(FileError::InvalidParameter));
    assert_eq!(vol.close(file), Err(FileError::InvalidParameter));
    assert_eq!(vol.total_ref_count(), 1);
}

// ============================================================================
// Directory enumeration
// ============================================================================

#[test]
fn test_listing_hides_metadata_files() {
    let mut vol = volume(
        MemoryEngine::new()
            .with_file("/readme.txt", b"hi")
            .with_dir("/boot"),
    );
    let root = vol.open_volume().unwrap();

    let names = list_dir(&mut vol, root);
    assert_eq!(names, [".", "..", "boot", "readme.txt"]);
    assert!(!names.iter().any(|n| n.starts_with('$')));

    let mut buf = [0u8; 1024];
    assert_eq!(vol.read(root, &mut buf), Ok(0));

    vol.set_position(root, 0).unwrap();
    assert_eq!(list_dir(&mut vol, root).len(), 4);
}

#[test]
fn test_listing_reports_entry_kind() {
    let mut vol = volume(MemoryEngine::new().with_file("/d/f", b"12345").with_dir("/d/sub"));
    let root = vol.open_volume().unwrap();
    let d = vol.open(root, "d", OpenMode::READ, FileAttributes::empty()).unwrap();

    let mut buf = [0u8; 1024];
    let mut entries = Vec::new();
    loop {
        let len = vol.read(d, &mut buf).unwrap();
        if len == 0 {
            break;
        }
        entries.push(FileInfo::decode(&buf[..len]).unwrap());
    }

    let f = entries.iter().find(|e| e.file_name == "f").unwrap();
    assert_eq!(f.file_size, 5);
    assert!(!f.attribute.contains(FileAttributes::DIRECTORY));
    let sub = entries.iter().find(|e| e.file_name == "sub").unwrap();
    assert!(sub.attribute.contains(FileAttributes::DIRECTORY));
}

#[test]
fn test_listing_buffer_too_small_keeps_position() {
    let mut vol = volume(MemoryEngine::new().with_file("/d/long-entry-name.txt", b""));
    let root = vol.open_volume().unwrap();
    let d = vol.open(root, "d", OpenMode::READ, FileAttributes::empty()).unwrap();

    let mut buf = [0u8; 1024];
    vol.read(d, &mut buf).unwrap();
    vol.read(d, &mut buf).unwrap();

    let mut small = [0u8; FILE_INFO_SIZE];
    let required = FILE_INFO_SIZE + ("long-entry-name.txt".len() + 1) * 2;
    assert_eq!(
        vol.read(d, &mut small),
        Err(FileError::BufferTooSmall { required })
    );

    let len = vol.read(d, &mut buf).unwrap();
    assert_eq!(len, required);
    assert_eq!(
        FileInfo::decode(&buf[..len]).unwrap().file_name,
        "long-entry-name.txt"
    );
    assert_eq!(vol.read(d, &mut buf), Ok(0));
}

// ============================================================================
// Delete
// ============================================================================

#[test]
fn test_delete_with_other_references_warns() {
    let mut vol = volume(MemoryEngine::new().with_file("/tmp.txt", b"x"));
    let root = vol.open_volume().unwrap();
    let first = vol.open(root, "tmp.txt", RW, FileAttributes::empty()).unwrap();
    let second = vol.open(root, "tmp.txt", RW, FileAttributes::empty()).unwrap();

    let outcome = vol.delete(first).unwrap();
    assert_eq!(outcome, DeleteOutcome::WarnDeleteFailure);
    assert_eq!(outcome.status(), 2);
    assert!(vol.engine().exists("/tmp.txt"));
    assert_eq!(vol.file(second).unwrap().ref_count(), 1);

    assert_eq!(vol.delete(second), Ok(DeleteOutcome::Deleted));
    assert!(!vol.engine().exists("/tmp.txt"));
    assert_eq!(vol.open_files(), 1);
    assert_eq!(vol.total_ref_count(), 1);

    vol.close(root).unwrap();
    assert!(!vol.is_mounted());
}

#[test]
fn test_delete_root_is_denied() {
    let mut vol = volume(MemoryEngine::new());
    let root = vol.open_volume().unwrap();
    assert_eq!(vol.delete(root), Err(FileError::AccessDenied));
    assert!(vol.is_mounted());
    assert_eq!(vol.total_ref_count(), 1);
}

#[test]
fn test_delete_last_reference_unmounts() {
    let mut vol = volume(MemoryEngine::new().with_file("/gone", b""));
    let root = vol.open_volume().unwrap();
    let file = vol.open(root, "gone", RW, FileAttributes::empty()).unwrap();
    vol.close(root).unwrap();
    assert!(vol.is_mounted());

    assert_eq!(vol.delete(file), Ok(DeleteOutcome::Deleted));
    assert!(!vol.is_mounted());
    assert_eq!(vol.engine().open_node_count(), 0);
}

#[test]
fn test_delete_on_read_only_volume_still_closes() {
    let mut vol = read_only_volume(MemoryEngine::new().with_file("/keep", b"k"));
    let root = vol.open_volume().unwrap();
    let file = vol.open(root, "keep", OpenMode::READ, FileAttributes::empty()).unwrap();

    assert_eq!(vol.delete(file), Ok(DeleteOutcome::WarnDeleteFailure));
    assert!(vol.engine().exists("/keep"));
    assert_eq!(vol.open_files(), 1);
    assert_eq!(vol.engine().open_node_count(), 1);
}

#[test]
fn test_delete_engine_failure_still_closes() {
    let mut engine = MemoryEngine::new().with_file("/locked", b"");
    engine.set_delete_failure(Some(FileError::AccessDenied));
    let mut vol = volume(engine);
    let root = vol.open_volume().unwrap();
    let file = vol.open(root, "locked", RW, FileAttributes::empty()).unwrap();

    assert_eq!(vol.delete(file), Ok(DeleteOutcome::WarnDeleteFailure));
    assert_eq!(vol.open_files(), 1);
    assert_eq!(vol.engine().open_node_count(), 1);
    assert_eq!(vol.total_ref_count(), 1);
}

// ============================================================================
// Read / Write / Position / Flush
// ============================================================================

#[test]
fn test_positions() {
    let mut vol = volume(MemoryEngine::new().with_file("/f", b"0123456789"));
    let root = vol.open_volume().unwrap();
    let file = vol.open(root, "f", RW, FileAttributes::empty()).unwrap();

    vol.set_position(file, END_OF_FILE).unwrap();
    assert_eq!(vol.get_position(file), Ok(10));
    assert_eq!(vol.set_position(file, 11), Err(FileError::Unsupported));
    assert_eq!(vol.get_position(file), Ok(10));

    vol.set_position(file, 4).unwrap();
    let mut buf = [0u8; 3];
    vol.read(file, &mut buf).unwrap();
    assert_eq!(&buf, b"456");
    assert_eq!(vol.get_position(file), Ok(7));

    vol.set_position(file, END_OF_FILE).unwrap();
    assert_eq!(vol.read(file, &mut buf), Ok(0));

    assert_eq!(vol.set_position(root, 3), Err(FileError::Unsupported));
    assert_eq!(vol.set_position(root, 0), Ok(()));
    assert_eq!(vol.get_position(root), Err(FileError::Unsupported));
}

#[test]
fn test_write_checks() {
    let mut vol = volume(MemoryEngine::new().with_dir("/d"));
    let root = vol.open_volume().unwrap();
    let dir = vol.open(root, "d", RW, FileAttributes::empty()).unwrap();
    assert_eq!(vol.write(dir, b"x"), Err(FileError::Unsupported));

    let file = vol.open(dir, "new", CREATE_RW, FileAttributes::empty()).unwrap();
    vol.write(file, b"abc").unwrap();
    vol.set_position(file, 1).unwrap();
    vol.write(file, b"XYZ").unwrap();
    assert_eq!(vol.engine().contents("/d/new"), Some(&b"aXYZ"[..]));
}

#[test]
fn test_flush() {
    let mut vol = volume(MemoryEngine::new().with_file("/f", b""));
    let root = vol.open_volume().unwrap();
    let reader = vol.open(root, "f", OpenMode::READ, FileAttributes::empty()).unwrap();
    assert_eq!(vol.flush(reader), Err(FileError::AccessDenied));

    let writer = vol.open(root, "f", RW, FileAttributes::empty()).unwrap();
    vol.flush(writer).unwrap();
    assert_eq!(vol.engine().flush_count(), 1);
}

#[test]
fn test_ex_variants_signal_token() {
    let mut vol = volume(MemoryEngine::new().with_file("/f", b"payload"));
    let root = vol.open_volume().unwrap();

    let mut token = IoToken::new();
    assert!(!token.is_signaled());
    let file = vol
        .open_ex(root, "f", RW, FileAttributes::empty(), &mut token)
        .unwrap();
    assert_eq!(token.status(), Some(Ok(())));

    let mut token = IoToken::new();
    let mut buf = [0u8; 16];
    assert_eq!(vol.read_ex(file, &mut buf, &mut token), Ok(7));
    assert!(token.is_signaled());
    assert_eq!(token.transferred(), 7);

    let mut token = IoToken::new();
    vol.write_ex(file, b"++", &mut token).unwrap();
    assert_eq!(token.transferred(), 2);

    let mut token = IoToken::new();
    vol.flush_ex(file, &mut token).unwrap();
    assert_eq!(token.status(), Some(Ok(())));

    let mut token = IoToken::new();
    assert!(vol.write_ex(root, b"x", &mut token).is_err());
    assert_eq!(token.status(), Some(Err(FileError::Unsupported)));
    assert_eq!(token.transferred(), 0);
}

// ============================================================================
// Read-only volumes
// ============================================================================

#[test]
fn test_forced_read_only() {
    let mut vol = read_only_volume(MemoryEngine::new().with_file("/f", b"data"));
    let root = vol.open_volume().unwrap();
    assert!(vol.is_read_only());

    assert_eq!(
        vol.open(root, "f", RW, FileAttributes::empty()),
        Err(FileError::WriteProtected)
    );
    assert_eq!(
        vol.open(root, "new", CREATE_RW, FileAttributes::empty()),
        Err(FileError::WriteProtected)
    );

    let file = vol.open(root, "f", OpenMode::READ, FileAttributes::empty()).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(vol.read(file, &mut buf), Ok(4));

    assert_eq!(vol.write(root, b"x"), Err(FileError::WriteProtected));
    assert_eq!(vol.flush(root), Ok(()));
    assert_eq!(vol.engine().flush_count(), 0);

    let info = FileInfo::default();
    let mut data = [0u8; 128];
    let len = info.encode(&mut data).unwrap();
    assert_eq!(
        vol.set_info(file, &Guid::FILE_INFO, &data[..len]),
        Err(FileError::WriteProtected)
    );
}

#[test]
fn test_engine_read_only() {
    let mut vol = volume(MemoryEngine::new().with_read_only(true));
    assert!(!vol.is_read_only());
    let root = vol.open_volume().unwrap();
    assert!(vol.is_read_only());
    assert_eq!(
        vol.open(root, "x", CREATE_RW, FileAttributes::empty()),
        Err(FileError::WriteProtected)
    );
}

// ============================================================================
// GetInfo / SetInfo
// ============================================================================

#[test]
fn test_get_info_buffer_protocol() {
    let mut vol = volume(MemoryEngine::new().with_file("/notes.txt", b"12345"));
    let root = vol.open_volume().unwrap();
    let file = vol.open(root, "notes.txt", OpenMode::READ, FileAttributes::empty()).unwrap();

    let mut small = [0xAAu8; 16];
    let err = vol.get_info(file, &Guid::FILE_INFO, &mut small).unwrap_err();
    let required = err.required_size().unwrap();
    assert_eq!(required, FILE_INFO_SIZE + 10 * 2);
    assert!(small.iter().all(|b| *b == 0xAA));

    let mut buf = vec![0u8; required];
    assert_eq!(vol.get_info(file, &Guid::FILE_INFO, &mut buf), Ok(required));
    let info = FileInfo::decode(&buf).unwrap();
    assert_eq!(info.file_name, "notes.txt");
    assert_eq!(info.file_size, 5);

    let root_info = file_info(&vol, root);
    assert_eq!(root_info.file_name, "");
    assert!(root_info.attribute.contains(FileAttributes::DIRECTORY));

    let unknown = Guid::new(1, 2, 3, [0; 8]);
    assert_eq!(
        vol.get_info(file, &unknown, &mut buf),
        Err(FileError::Unsupported)
    );
}

#[test]
fn test_file_system_info() {
    let disk = MemoryDisk::ntfs(512, 64).with_reported_block_size(0);
    let mut vol = Volume::new(
        MemoryEngine::new().with_label("SYSTEM"),
        disk,
        DriverConfig::default(),
    );
    let root = vol.open_volume().unwrap();

    let mut buf = [0u8; 256];
    let len = vol.get_info(root, &Guid::FILE_SYSTEM_INFO, &mut buf).unwrap();
    let info = FileSystemInfo::decode(&buf[..len]).unwrap();
    assert_eq!(info.block_size, 512);
    assert_eq!(info.volume_size, 64 * 512);
    assert_eq!(info.volume_label, "SYSTEM");
    assert!(!info.read_only);
    assert!(info.free_space > 0);
}

#[test]
fn test_volume_label_root_only() {
    let mut vol = volume(MemoryEngine::new().with_label("OLD").with_dir("/d"));
    let root = vol.open_volume().unwrap();
    let d = vol.open(root, "d", RW, FileAttributes::empty()).unwrap();

    let mut buf = [0u8; 64];
    assert_eq!(
        vol.get_info(d, &Guid::VOLUME_LABEL, &mut buf),
        Err(FileError::AccessDenied)
    );
    let len = vol.get_info(root, &Guid::VOLUME_LABEL, &mut buf).unwrap();
    assert_eq!(decode_volume_label(&buf[..len]).unwrap(), "OLD");

    let mut label = [0u8; 64];
    let len = zos_fileio::core::encode_volume_label("NEW", &mut label).unwrap();
    assert_eq!(
        vol.set_info(d, &Guid::VOLUME_LABEL, &label[..len]),
        Err(FileError::AccessDenied)
    );
    vol.set_info(root, &Guid::VOLUME_LABEL, &label[..len]).unwrap();
    assert_eq!(vol.label(), Some("NEW"));
    assert_eq!(vol.engine().label(), Some("NEW"));

    let info = FileSystemInfo {
        volume_label: String::from("FS"),
        ..FileSystemInfo::default()
    };
    let len = info.encode(&mut buf).unwrap();
    vol.set_info(root, &Guid::FILE_SYSTEM_INFO, &buf[..len]).unwrap();
    assert_eq!(vol.label(), Some("FS"));
}

#[test]
fn test_set_info_rename() {
    let mut vol = volume(MemoryEngine::new().with_file("/d/old.txt", b"abc"));
    let root = vol.open_volume().unwrap();
    let d = vol.open(root, "d", OpenMode::READ, FileAttributes::empty()).unwrap();
    let file = vol.open(d, "old.txt", RW, FileAttributes::empty()).unwrap();

    let mut info = file_info(&vol, file);
    info.file_name = String::from("new.txt");
    let mut buf = [0u8; 256];
    let len = info.encode(&mut buf).unwrap();
    vol.set_info(file, &Guid::FILE_INFO, &buf[..len]).unwrap();

    assert_eq!(vol.file(file).unwrap().path(), "/d/new.txt");
    assert_eq!(vol.file(file).unwrap().base_name(), "new.txt");
    assert!(vol.engine().exists("/d/new.txt"));
    assert!(!vol.engine().exists("/d/old.txt"));

    let reopened = vol.open(d, "new.txt", OpenMode::READ, FileAttributes::empty()).unwrap();
    assert_eq!(reopened.file(), file.file());
}

#[test]
fn test_rename_directory_moves_open_children() {
    let mut vol = volume(MemoryEngine::new().with_file("/d/f", b"abc").with_dir("/d/sub"));
    let root = vol.open_volume().unwrap();
    let d = vol.open(root, "d", RW, FileAttributes::empty()).unwrap();
    let child = vol.open(d, "f", OpenMode::READ, FileAttributes::empty()).unwrap();
    let sub = vol.open(d, "sub", OpenMode::READ, FileAttributes::empty()).unwrap();

    let mut info = file_info(&vol, d);
    info.file_name = String::from("e");
    let mut buf = [0u8; 256];
    let len = info.encode(&mut buf).unwrap();
    vol.set_info(d, &Guid::FILE_INFO, &buf[..len]).unwrap();

    assert_eq!(vol.file(d).unwrap().path(), "/e");
    assert_eq!(vol.file(child).unwrap().path(), "/e/f");
    assert_eq!(vol.file(child).unwrap().base_name(), "f");
    assert_eq!(vol.file(sub).unwrap().path(), "/e/sub");

    assert_eq!(
        vol.open(root, "d/f", OpenMode::READ, FileAttributes::empty()),
        Err(FileError::NotFound)
    );
    let again = vol.open(root, "e/f", OpenMode::READ, FileAttributes::empty()).unwrap();
    assert_eq!(again.file(), child.file());
    assert_eq!(vol.file(child).unwrap().ref_count(), 2);
    assert_eq!(file_info(&vol, child).file_name, "f");
}

#[test]
fn test_file_system_info_with_impossible_geometry() {
    let disk = MemoryDisk::ntfs(512, 64).with_reported_last_block(u64::MAX);
    let mut vol = Volume::new(MemoryEngine::new(), disk, DriverConfig::default());
    let root = vol.open_volume().unwrap();

    let mut buf = [0u8; 256];
    assert_eq!(
        vol.get_info(root, &Guid::FILE_SYSTEM_INFO, &mut buf),
        Err(FileError::DeviceError)
    );
}

#[test]
fn test_set_info_rejections() {
    let mut vol = volume(MemoryEngine::new().with_file("/f", b"abc"));
    let root = vol.open_volume().unwrap();
    let file = vol.open(root, "f", RW, FileAttributes::empty()).unwrap();
    let mut buf = [0u8; 256];

    let mut info = file_info(&vol, file);
    info.attribute = FileAttributes::from_bits_retain(0x40);
    let len = info.encode(&mut buf).unwrap();
    assert_eq!(
        vol.set_info(file, &Guid::FILE_INFO, &buf[..len]),
        Err(FileError::InvalidParameter)
    );

    let mut info = file_info(&vol, root);
    info.file_name = String::from("renamed-root");
    let len = info.encode(&mut buf).unwrap();
    assert_eq!(
        vol.set_info(root, &Guid::FILE_INFO, &buf[..len]),
        Err(FileError::AccessDenied)
    );

    assert_eq!(
        vol.set_info(file, &Guid::FILE_INFO, &buf[..10]),
        Err(FileError::BadBufferSize)
    );

    let reader = vol.open(root, "f", OpenMode::READ, FileAttributes::empty()).unwrap();
    assert_eq!(reader.file(), file.file());
    let mut info = file_info(&vol, file);
    info.file_name = String::from("g");
    let len = info.encode(&mut buf).unwrap();
    assert_eq!(
        vol.set_info(reader, &Guid::FILE_INFO, &buf[..len]),
        Err(FileError::AccessDenied)
    );
    assert_eq!(vol.file(file).unwrap().path(), "/f");
}

#[test]
fn test_read_only_value_cannot_modify() {
    let mut vol = volume(MemoryEngine::new().with_file("/f", b"abc"));
    let root = vol.open_volume().unwrap();
    let writer = vol.open(root, "f", RW, FileAttributes::empty()).unwrap();
    let reader = vol.open(root, "f", OpenMode::READ, FileAttributes::empty()).unwrap();

    assert_eq!(vol.write(reader, b"X"), Err(FileError::AccessDenied));
    assert_eq!(vol.flush(reader), Err(FileError::AccessDenied));

    let mut info = file_info(&vol, reader);
    info.attribute |= FileAttributes::HIDDEN;
    info.file_size = 1;
    let mut buf = [0u8; 256];
    let len = info.encode(&mut buf).unwrap();
    assert_eq!(
        vol.set_info(reader, &Guid::FILE_INFO, &buf[..len]),
        Err(FileError::AccessDenied)
    );
    assert_eq!(vol.engine().contents("/f"), Some(&b"abc"[..]));
    assert!(!file_info(&vol, writer).attribute.contains(FileAttributes::HIDDEN));

    vol.set_info(writer, &Guid::FILE_INFO, &buf[..len]).unwrap();
    assert_eq!(vol.engine().contents("/f"), Some(&b"a"[..]));
    assert!(file_info(&vol, reader).attribute.contains(FileAttributes::HIDDEN));
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_uninstall_with_open_handles() {
    init_logging();
    let mut registry: VolumeRegistry<MemoryEngine, MemoryDisk> =
        VolumeRegistry::new(DriverConfig::default());
    let id = registry
        .install(
            MemoryEngine::new().with_file("/f", b"abc"),
            MemoryDisk::ntfs(512, 64),
        )
        .unwrap();
    assert_eq!(
        registry.install(MemoryEngine::new(), MemoryDisk::blank(512, 64)),
        Err(FileError::Unsupported)
    );
    assert_eq!(registry.len(), 1);

    let vol = registry.get_mut(id).unwrap();
    let root = vol.open_volume().unwrap();
    let file = vol.open(root, "f", RW, FileAttributes::empty()).unwrap();

    let mut vol = registry.uninstall(id).unwrap();
    assert!(registry.is_empty());
    assert!(logged("Forcing unmount"));
    assert!(!vol.is_mounted());
    assert_eq!(vol.engine().open_node_count(), 0);

    let mut buf = [0u8; 4];
    assert_eq!(vol.read(file, &mut buf), Err(FileError::DeviceError));
    assert_eq!(vol.write(file, b"x"), Err(FileError::DeviceError));
    assert_eq!(
        vol.open(root, "f", OpenMode::READ, FileAttributes::empty()),
        Err(FileError::DeviceError)
    );
    assert_eq!(vol.delete(file), Err(FileError::AccessDenied));
    vol.close(file).unwrap();
    vol.close(root).unwrap();
    assert_eq!(vol.open_files(), 0);
    assert_eq!(vol.engine().unmount_count(), 1);
}
