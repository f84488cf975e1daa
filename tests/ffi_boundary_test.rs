//! C boundary tests
//!
//! Drives the exported `nx_*` functions exactly as a C host would. The
//! session is process-wide, so every test holds `SERIAL` for its duration.

use nx_bridge::ffi::{self, *};
use nx_bridge::{MemoryArchive, MemoryNode, MemoryOpener};
use parking_lot::Mutex;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

static SERIAL: Mutex<()> = parking_lot::const_mutex(());

fn map_archive() -> MemoryArchive {
    let post = MemoryNode::new("post").with_child(
        MemoryNode::new("0")
            .with_child(MemoryNode::vector("origin", 12, -5))
            .with_child(MemoryNode::bitmap("canvas", 16, 16, vec![0xAB; 1024])),
    );
    MemoryArchive::new(
        MemoryNode::new("").with_child(
            MemoryNode::new("Obj").with_child(
                MemoryNode::new("guide.img").with_child(
                    MemoryNode::new("common")
                        .with_child(post)
                        .with_child(MemoryNode::integer("delay", 120))
                        .with_child(MemoryNode::real("speed", 1.5))
                        .with_child(MemoryNode::string("name", "signpost"))
                        .with_child(MemoryNode::audio("bgm", vec![1, 2, 3, 4, 5])),
                ),
            ),
        ),
    )
}

fn ui_archive() -> MemoryArchive {
    MemoryArchive::new(
        MemoryNode::new("").with_child(
            MemoryNode::new("Basic.img").with_child(
                MemoryNode::new("Cursor")
                    .with_child(MemoryNode::vector("origin", 3, 4))
                    .with_child(MemoryNode::integer("delay", 7)),
            ),
        ),
    )
}

fn item_archive() -> MemoryArchive {
    MemoryArchive::new(
        MemoryNode::new("").with_child(
            MemoryNode::new("Icon")
                .with_child(MemoryNode::string("_outlink", "UI/Basic.img/Cursor")),
        ),
    )
}

/// Fresh session over the fixture archives rooted at `/nx/`
fn start_session() -> Arc<MemoryOpener> {
    nx_teardown();
    let opener = Arc::new(MemoryOpener::new());
    opener.insert("/nx/Map.nx", map_archive());
    opener.insert("/nx/UI.nx", ui_archive());
    opener.insert("/nx/Item.nx", item_archive());
    ffi::install_opener(opener.clone());

    let base = CString::new("/nx").unwrap();
    assert!(unsafe { nx_initialize(base.as_ptr()) });
    opener
}

fn resolve(path: &str) -> u64 {
    let path = CString::new(path).unwrap();
    unsafe { nx_resolve_node(path.as_ptr()) }
}

fn child(node: u64, name: &str) -> u64 {
    let name = CString::new(name).unwrap();
    unsafe { nx_get_child(node, name.as_ptr()) }
}

fn name_of(node: u64) -> String {
    let mut buf = [0 as c_char; 64];
    unsafe { nx_node_name(node, buf.as_mut_ptr(), buf.len()) };
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

#[test]
fn test_resolve_vector_scenario() {
    let _guard = SERIAL.lock();
    start_session();

    let node = resolve("Map.nx/Obj/guide.img/common/post/0");
    assert_ne!(node, 0);

    let origin = child(node, "origin");
    assert_ne!(origin, 0);
    assert_eq!(nx_node_type(origin), 4);

    let (mut x, mut y) = (0, 0);
    assert!(unsafe { nx_get_vector(origin, &mut x, &mut y) });
    assert_eq!((x, y), (12, -5));

    let (mut ox, mut oy) = (0, 0);
    assert!(unsafe { nx_get_origin(node, &mut ox, &mut oy) });
    assert_eq!((ox, oy), (12, -5));

    assert!(nx_release_node(origin));
    assert!(nx_release_node(node));
    nx_teardown();
}

#[test]
fn test_missing_nodes_return_null() {
    let _guard = SERIAL.lock();
    start_session();

    assert_eq!(resolve("Map.nx/Obj/DoesNotExist"), 0);
    assert_eq!(resolve("Missing.nx/anything"), 0);

    let common = resolve("Map/Obj/guide.img/common");
    assert_eq!(child(common, "nope"), 0);

    let nope = CString::new("nope").unwrap();
    let delay = CString::new("delay").unwrap();
    assert!(!unsafe { nx_has_child(common, nope.as_ptr()) });
    assert!(unsafe { nx_has_child(common, delay.as_ptr()) });
    assert!(!unsafe { nx_has_child(common, ptr::null()) });
    nx_teardown();
}

#[test]
fn test_malformed_archive_returns_null_until_healed() {
    let _guard = SERIAL.lock();
    let opener = start_session();
    opener.insert("/nx/Sound.nx", ui_archive());
    opener.fail("/nx/Sound.nx");

    assert_eq!(resolve("Sound.nx/Basic.img/Cursor"), 0);
    assert_eq!(resolve("Sound/Basic.img/Cursor"), 0);
    assert_eq!(ffi::session().unwrap().open_archive_count(), 3);

    opener.heal("/nx/Sound.nx");
    let cursor = resolve("Sound.nx/Basic.img/Cursor");
    assert_ne!(cursor, 0);
    assert_eq!(name_of(cursor), "Cursor");
    assert_eq!(ffi::session().unwrap().open_archive_count(), 4);
    assert_eq!(opener.open_count("/nx/Sound.nx"), 3);
    nx_teardown();
}

#[test]
fn test_typed_reads() {
    let _guard = SERIAL.lock();
    start_session();

    let common = resolve("Map.nx/Obj/guide.img/common");
    let delay = child(common, "delay");
    let speed = child(common, "speed");
    let name = child(common, "name");

    assert_eq!(nx_node_type(delay), 1);
    assert_eq!(nx_get_int(delay), 120);
    assert_eq!(nx_node_type(speed), 2);
    assert_eq!(nx_get_real(speed), 1.5);
    assert_eq!(nx_node_type(name), 3);

    let mut buf = [0 as c_char; 64];
    let len = unsafe { nx_get_string(name, buf.as_mut_ptr(), buf.len()) };
    assert_eq!(len, "signpost".len());
    assert_eq!(unsafe { CStr::from_ptr(buf.as_ptr()) }.to_str().unwrap(), "signpost");

    // Length query, then truncation
    assert_eq!(unsafe { nx_get_string(name, ptr::null_mut(), 0) }, 8);
    let mut small = [0 as c_char; 5];
    assert_eq!(unsafe { nx_get_string(name, small.as_mut_ptr(), small.len()) }, 8);
    assert_eq!(unsafe { CStr::from_ptr(small.as_ptr()) }.to_str().unwrap(), "sign");

    // Mismatched scalar reads fall back to defaults
    assert_eq!(nx_get_int(name), 0);
    assert_eq!(nx_get_real(delay), 0.0);

    // Vector read on a non-vector leaves the outputs untouched
    let (mut x, mut y) = (99, 99);
    assert!(!unsafe { nx_get_vector(delay, &mut x, &mut y) });
    assert_eq!((x, y), (99, 99));
    nx_teardown();
}

#[test]
fn test_bitmap_transfer() {
    let _guard = SERIAL.lock();
    start_session();

    let canvas = resolve("Map.nx/Obj/guide.img/common/post/0/canvas");
    assert_eq!(nx_node_type(canvas), 5);

    let (mut w, mut h) = (0, 0);
    assert!(unsafe { nx_get_bitmap_size(canvas, &mut w, &mut h) });
    assert_eq!((w, h), (16, 16));

    let mut data: *mut u8 = ptr::null_mut();
    let mut size: usize = 0;
    assert!(unsafe { nx_get_bitmap(canvas, &mut data, &mut size) });
    assert!(!data.is_null());
    assert_eq!(size, 1024);

    // Buffer outlives the session
    nx_teardown();
    let bytes = unsafe { std::slice::from_raw_parts(data, size) };
    assert!(bytes.iter().all(|&b| b == 0xAB));
    unsafe { nx_free_bitmap(data, size) };
}

#[test]
fn test_bitmap_on_non_bitmap_fails_cleanly() {
    let _guard = SERIAL.lock();
    start_session();

    let delay = resolve("Map.nx/Obj/guide.img/common/delay");
    let mut data: *mut u8 = ptr::null_mut();
    let mut size: usize = 77;
    assert!(!unsafe { nx_get_bitmap(delay, &mut data, &mut size) });
    assert!(data.is_null());
    assert_eq!(size, 77);
    assert!(!unsafe { nx_get_bitmap(delay, ptr::null_mut(), &mut size) });

    // Freeing null is a no-op
    unsafe { nx_free_bitmap(ptr::null_mut(), 0) };
    nx_teardown();
}

#[test]
fn test_audio_transfer() {
    let _guard = SERIAL.lock();
    start_session();

    let bgm = resolve("Map.nx/Obj/guide.img/common/bgm");
    assert_eq!(nx_node_type(bgm), 6);

    let mut data: *mut u8 = ptr::null_mut();
    let mut size: usize = 0;
    assert!(unsafe { nx_get_audio(bgm, &mut data, &mut size) });
    assert_eq!(unsafe { std::slice::from_raw_parts(data, size) }, &[1, 2, 3, 4, 5]);
    unsafe { nx_free_audio(data, size) };
    nx_teardown();
}

#[test]
fn test_children_by_index() {
    let _guard = SERIAL.lock();
    start_session();

    let common = resolve("Map.nx/Obj/guide.img/common");
    assert_eq!(nx_child_count(common), 5);

    let names: Vec<String> = (0..nx_child_count(common))
        .map(|i| {
            let handle = nx_get_child_by_index(common, i);
            assert_ne!(handle, 0);
            let name = name_of(handle);
            nx_release_node(handle);
            name
        })
        .collect();
    assert_eq!(names, ["post", "delay", "speed", "name", "bgm"]);

    assert_eq!(nx_get_child_by_index(common, 5), 0);
    assert_eq!(nx_get_child_by_index(common, -1), 0);
    nx_teardown();
}

#[test]
fn test_release_semantics() {
    let _guard = SERIAL.lock();
    start_session();

    let a = resolve("Map.nx/Obj/guide.img/common/delay");
    let b = resolve("Map.nx/Obj/guide.img/common/delay");
    assert_ne!(a, b);
    assert_eq!(nx_get_int(a), nx_get_int(b));

    assert!(nx_release_node(a));
    assert!(!nx_release_node(a));
    assert_eq!(nx_get_int(a), 0);
    assert_eq!(nx_node_type(a), 0);
    assert_eq!(nx_get_int(b), 120);

    assert!(!nx_release_node(0));
    nx_teardown();
}

#[test]
fn test_outlink() {
    let _guard = SERIAL.lock();
    start_session();

    let icon = resolve("Item.nx/Icon");
    let target = nx_resolve_outlink(icon);
    assert_ne!(target, 0);
    assert_eq!(name_of(target), "Cursor");
    assert_eq!(nx_get_int(child(target, "delay")), 7);

    // No link: a fresh handle to the same node
    let cursor = resolve("UI/Basic.img/Cursor");
    let same = nx_resolve_outlink(cursor);
    assert_ne!(same, cursor);
    assert_eq!(name_of(same), "Cursor");
    nx_teardown();
}

#[test]
fn test_teardown_invalidates_handles() {
    let _guard = SERIAL.lock();
    start_session();

    let node = resolve("Map.nx/Obj/guide.img/common/delay");
    assert_eq!(nx_get_int(node), 120);
    nx_teardown();

    // No session: everything is a sentinel
    assert_eq!(nx_get_int(node), 0);
    assert!(!nx_release_node(node));
    assert_eq!(resolve("Map.nx/Obj"), 0);
    assert_eq!(name_of(node), "");
    nx_teardown();

    // A new session does not honor old handles
    start_session();
    assert_eq!(nx_get_int(node), 0);
    assert_ne!(resolve("Map.nx/Obj"), 0);
    nx_teardown();
}

#[test]
fn test_initialize_is_idempotent() {
    let _guard = SERIAL.lock();
    let opener = start_session();

    let other = CString::new("/elsewhere").unwrap();
    assert!(unsafe { nx_initialize(other.as_ptr()) });
    assert_eq!(ffi::session().unwrap().config().base_path, "/nx/");

    // Preload opened each fixture archive exactly once
    assert_eq!(opener.open_count("/nx/Map.nx"), 1);
    assert_eq!(opener.open_count("/nx/UI.nx"), 1);
    nx_teardown();

    assert!(!ffi::is_initialized());
    assert!(!unsafe { nx_initialize(ptr::null()) });
}

#[test]
fn test_null_and_garbage_handles() {
    let _guard = SERIAL.lock();
    start_session();

    for handle in [0u64, u64::MAX, u64::MAX - 1, 1 << 63] {
        assert_eq!(nx_node_type(handle), 0);
        assert_eq!(nx_child_count(handle), 0);
        assert_eq!(nx_get_int(handle), 0);
        assert_eq!(nx_resolve_outlink(handle), 0);
        assert_eq!(name_of(handle), "");
    }
    assert_eq!(unsafe { nx_resolve_node(ptr::null()) }, 0);
    nx_teardown();
}
