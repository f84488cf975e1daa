//! C API
//!
//! A stable C ABI over one process-wide [`NxBridge`] session. Nothing here
//! reports errors: every failure (bad argument, stale handle, missing node,
//! decode error, even a panic) becomes the function's sentinel value and is
//! logged through `tracing`.
//!
//! Handles are `uint64_t` values and `0` is the null handle. Handles do not
//! point at memory; a stale or made-up handle is simply not found.
//!
//! # Buffer ownership
//!
//! `nx_get_bitmap` and `nx_get_audio` hand the caller a freshly allocated
//! buffer together with its length in bytes. The caller owns it and must
//! return it, with the same length, to `nx_free_bitmap` / `nx_free_audio`.
//! These buffers are independent of the session: `nx_teardown` does not free
//! them and they stay valid until released.
//!
//! # Strings
//!
//! `nx_node_name` and `nx_get_string` copy into a caller-supplied buffer with
//! `snprintf` semantics: at most `buf_len - 1` bytes plus a terminating NUL
//! are written, and the return value is the full length of the string in
//! bytes (excluding the NUL). Pass a null buffer to query the length.
//!
//! # Example
//!
//! ```c
//! nx_initialize("/opt/game/nx");
//! uint64_t node = nx_resolve_node("Map.nx/Obj/guide.img/common/post/0");
//! int32_t x, y;
//! if (node && nx_get_vector(node, &x, &y)) {
//!     printf("%d,%d\n", x, y);
//! }
//! nx_release_node(node);
//! nx_teardown();
//! ```

use crate::archive::{Archive, ArchiveOpener};
use crate::bridge::NxBridge;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::handle::NodeHandle;
use parking_lot::RwLock;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

static OPENER: RwLock<Option<Arc<dyn ArchiveOpener>>> = parking_lot::const_rwlock(None);
static SESSION: RwLock<Option<Arc<NxBridge>>> = parking_lot::const_rwlock(None);

/// Opener used when the host never installed one; every open fails
struct NoBackend;

impl ArchiveOpener for NoBackend {
    fn open(&self, path: &str) -> Result<Arc<dyn Archive>> {
        Err(BridgeError::ArchiveNotFound(format!(
            "{} (no archive backend installed)",
            path
        )))
    }
}

/// Install the archive decoder used by the next `nx_initialize`
///
/// Rust hosts that link this crate call this before handing control to C
/// code. A live session keeps the opener it was created with.
pub fn install_opener(opener: Arc<dyn ArchiveOpener>) {
    *OPENER.write() = Some(opener);
}

/// Start a session from a full config; same rules as `nx_initialize`
pub fn initialize_with(config: BridgeConfig) -> bool {
    let mut session = SESSION.write();
    if let Some(existing) = session.as_ref() {
        if existing.config().base_path != config.base_path {
            warn!(
                "NX bridge already initialized at {:?}; ignoring {:?}",
                existing.config().base_path,
                config.base_path
            );
        }
        return true;
    }

    let opener = OPENER.read().clone().unwrap_or_else(|| {
        warn!("No archive backend installed; every archive open will fail");
        Arc::new(NoBackend) as Arc<dyn ArchiveOpener>
    });

    let result = panic::catch_unwind(AssertUnwindSafe(|| NxBridge::initialize(config, opener)));
    match result {
        Ok(bridge) => {
            *session = Some(Arc::new(bridge));
            true
        }
        Err(_) => {
            error!("Panic during NX bridge initialization");
            false
        }
    }
}

/// The live session, if any
pub fn session() -> Option<Arc<NxBridge>> {
    SESSION.read().clone()
}

pub fn is_initialized() -> bool {
    SESSION.read().is_some()
}

/// Run `op` against the live session, flattening every failure to `fallback`
fn boundary<T>(name: &str, fallback: T, op: impl FnOnce(&NxBridge) -> Result<T>) -> T {
    let Some(bridge) = session() else {
        debug!("{}: {}", name, BridgeError::NotInitialized);
        return fallback;
    };

    match panic::catch_unwind(AssertUnwindSafe(|| op(bridge.as_ref()))) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            debug!("{}: {}", name, e);
            fallback
        }
        Err(_) => {
            error!("{}: panic caught at the C boundary", name);
            fallback
        }
    }
}

fn handle_arg(raw: u64) -> Result<NodeHandle> {
    NodeHandle::from_raw(raw).ok_or(BridgeError::InvalidHandle)
}

/// # Safety
/// `ptr` must be null or a valid NUL-terminated string.
unsafe fn str_arg<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(BridgeError::InvalidArgument("null string".into()));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| BridgeError::InvalidArgument(format!("string is not UTF-8: {}", e)))
}

/// Copy `value` into `buf` with snprintf semantics; returns `value.len()`
///
/// # Safety
/// `buf` must be null or valid for `buf_len` writable bytes.
unsafe fn copy_to_c_buffer(value: &str, buf: *mut c_char, buf_len: usize) -> usize {
    if !buf.is_null() && buf_len > 0 {
        let n = value.len().min(buf_len - 1);
        std::ptr::copy_nonoverlapping(value.as_ptr(), buf as *mut u8, n);
        *buf.add(n) = 0;
    }
    value.len()
}

/// Move `bytes` into a caller-owned allocation
///
/// The returned pointer is released with [`free_buffer`] using the same
/// length.
fn into_raw_buffer(bytes: Vec<u8>) -> (*mut u8, usize) {
    let boxed = bytes.into_boxed_slice();
    let len = boxed.len();
    (Box::into_raw(boxed) as *mut u8, len)
}

/// # Safety
/// `data` must be null or come from [`into_raw_buffer`] with this `len`,
/// and must not have been freed already.
unsafe fn free_buffer(data: *mut u8, len: usize) {
    if data.is_null() {
        return;
    }
    drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(data, len)));
}

/// Start the process-wide session
///
/// Sets the base directory (a trailing `/` is added when missing) and opens
/// `Map.nx`, `Character.nx`, `Item.nx`, `String.nx` and `UI.nx` best-effort;
/// missing archives do not fail initialization. Calling again while a
/// session is live returns true and keeps the first base path.
///
/// # Returns
/// * `true` on success
/// * `false` if `base_path` is null or not UTF-8, or on an internal failure
///
/// # Safety
/// * `base_path` must be null or a valid NUL-terminated string
#[no_mangle]
pub unsafe extern "C" fn nx_initialize(base_path: *const c_char) -> bool {
    match str_arg(base_path) {
        Ok(base_path) => initialize_with(BridgeConfig::new(base_path)),
        Err(e) => {
            warn!("nx_initialize: {}", e);
            false
        }
    }
}

/// End the process-wide session
///
/// Every outstanding handle becomes invalid and every archive is closed.
/// Bitmap and audio buffers already returned stay valid. Safe to call when
/// no session is live.
#[no_mangle]
pub extern "C" fn nx_teardown() {
    let Some(bridge) = SESSION.write().take() else {
        return;
    };
    if panic::catch_unwind(AssertUnwindSafe(|| bridge.teardown())).is_err() {
        error!("nx_teardown: panic caught at the C boundary");
    }
    info!("NX bridge session closed");
}

/// Resolve a combined path such as `"Map.nx/Obj/guide.img/common/post/0"`
///
/// # Returns
/// * A new handle (release with `nx_release_node`)
/// * `0` if the archive cannot be opened or any segment is missing
///
/// # Safety
/// * `path` must be null or a valid NUL-terminated string
#[no_mangle]
pub unsafe extern "C" fn nx_resolve_node(path: *const c_char) -> u64 {
    boundary("nx_resolve_node", 0, |bridge| {
        let path = str_arg(path)?;
        Ok(bridge.resolve(path)?.into_raw())
    })
}

/// Release one handle; other handles are unaffected
///
/// Returns false for the null handle or a handle already released.
#[no_mangle]
pub extern "C" fn nx_release_node(node: u64) -> bool {
    boundary("nx_release_node", false, |bridge| {
        Ok(bridge.release(handle_arg(node)?))
    })
}

/// Copy the node's name into `buf`
///
/// # Returns
/// * The name's length in bytes, excluding the NUL
/// * `0` on an invalid handle (and `buf` is left as an empty string)
///
/// # Safety
/// * `buf` must be null or valid for `buf_len` writable bytes
#[no_mangle]
pub unsafe extern "C" fn nx_node_name(node: u64, buf: *mut c_char, buf_len: usize) -> usize {
    let name = boundary("nx_node_name", String::new(), |bridge| {
        bridge.node_name(handle_arg(node)?)
    });
    copy_to_c_buffer(&name, buf, buf_len)
}

/// Declared type: 0=none, 1=integer, 2=real, 3=string, 4=vector, 5=bitmap, 6=audio
///
/// Returns 0 on an invalid handle.
#[no_mangle]
pub extern "C" fn nx_node_type(node: u64) -> i32 {
    boundary("nx_node_type", 0, |bridge| {
        Ok(bridge.node_type(handle_arg(node)?)?.as_i32())
    })
}

/// Number of children; 0 on an invalid handle
#[no_mangle]
pub extern "C" fn nx_child_count(node: u64) -> i32 {
    boundary("nx_child_count", 0, |bridge| {
        let count = bridge.child_count(handle_arg(node)?)?;
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    })
}

/// Integer payload; 0 on an invalid handle or a non-integer node
#[no_mangle]
pub extern "C" fn nx_get_int(node: u64) -> i64 {
    boundary("nx_get_int", 0, |bridge| bridge.get_int(handle_arg(node)?))
}

/// Real payload; 0.0 on an invalid handle or a non-real node
#[no_mangle]
pub extern "C" fn nx_get_real(node: u64) -> f64 {
    boundary("nx_get_real", 0.0, |bridge| bridge.get_real(handle_arg(node)?))
}

/// Copy the string payload into `buf`
///
/// Same buffer contract as `nx_node_name`. Non-string nodes read as "".
///
/// # Safety
/// * `buf` must be null or valid for `buf_len` writable bytes
#[no_mangle]
pub unsafe extern "C" fn nx_get_string(node: u64, buf: *mut c_char, buf_len: usize) -> usize {
    let value = boundary("nx_get_string", String::new(), |bridge| {
        bridge.get_string(handle_arg(node)?)
    });
    copy_to_c_buffer(&value, buf, buf_len)
}

/// Read a vector node into `x` / `y`
///
/// Returns false, leaving the outputs untouched, unless the node is
/// declared as a vector.
///
/// # Safety
/// * `x` and `y` must be null or valid for writes
#[no_mangle]
pub unsafe extern "C" fn nx_get_vector(node: u64, x: *mut i32, y: *mut i32) -> bool {
    if x.is_null() || y.is_null() {
        return false;
    }
    match boundary("nx_get_vector", None, |bridge| {
        bridge.get_vector(handle_arg(node)?)
    }) {
        Some(v) => {
            *x = v.x;
            *y = v.y;
            true
        }
        None => false,
    }
}

/// Decode a bitmap node into a new caller-owned buffer
///
/// On success `*data` points at `*size` bytes of decoded pixel data, the
/// exact output of the archive decoder (`*size` counts bytes, not pixels or
/// rows). Release it with `nx_free_bitmap(*data, *size)`. On failure, or if
/// the node is not a bitmap, returns false and leaves both outputs untouched.
///
/// # Safety
/// * `data` and `size` must be null or valid for writes
#[no_mangle]
pub unsafe extern "C" fn nx_get_bitmap(node: u64, data: *mut *mut u8, size: *mut usize) -> bool {
    if data.is_null() || size.is_null() {
        return false;
    }
    match boundary("nx_get_bitmap", None, |bridge| {
        bridge.get_bitmap(handle_arg(node)?)
    }) {
        Some(bitmap) => {
            let (ptr, len) = into_raw_buffer(bitmap.data);
            *data = ptr;
            *size = len;
            true
        }
        None => false,
    }
}

/// Read a bitmap node's dimensions without transferring its pixels
///
/// # Safety
/// * `width` and `height` must be null or valid for writes
#[no_mangle]
pub unsafe extern "C" fn nx_get_bitmap_size(node: u64, width: *mut i32, height: *mut i32) -> bool {
    if width.is_null() || height.is_null() {
        return false;
    }
    match boundary("nx_get_bitmap_size", None, |bridge| {
        bridge.get_bitmap_size(handle_arg(node)?)
    }) {
        Some((w, h)) => {
            *width = i32::from(w);
            *height = i32::from(h);
            true
        }
        None => false,
    }
}

/// Free a buffer returned by `nx_get_bitmap`
///
/// # Safety
/// * `data` must be null or a pointer returned by `nx_get_bitmap`
/// * `size` must be the size returned alongside it
/// * Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn nx_free_bitmap(data: *mut u8, size: usize) {
    free_buffer(data, size);
}

/// Copy an audio node's payload into a new caller-owned buffer
///
/// Same contract as `nx_get_bitmap`; release with `nx_free_audio`.
///
/// # Safety
/// * `data` and `size` must be null or valid for writes
#[no_mangle]
pub unsafe extern "C" fn nx_get_audio(node: u64, data: *mut *mut u8, size: *mut usize) -> bool {
    if data.is_null() || size.is_null() {
        return false;
    }
    match boundary("nx_get_audio", None, |bridge| {
        bridge.get_audio(handle_arg(node)?)
    }) {
        Some(audio) => {
            let (ptr, len) = into_raw_buffer(audio.data);
            *data = ptr;
            *size = len;
            true
        }
        None => false,
    }
}

/// Free a buffer returned by `nx_get_audio`
///
/// # Safety
/// * `data` must be null or a pointer returned by `nx_get_audio`
/// * `size` must be the size returned alongside it
/// * Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn nx_free_audio(data: *mut u8, size: usize) {
    free_buffer(data, size);
}

/// New handle for the child named `name`; 0 if absent
///
/// # Safety
/// * `name` must be null or a valid NUL-terminated string
#[no_mangle]
pub unsafe extern "C" fn nx_get_child(node: u64, name: *const c_char) -> u64 {
    boundary("nx_get_child", 0, |bridge| {
        let name = str_arg(name)?;
        Ok(bridge.get_child(handle_arg(node)?, name)?.into_raw())
    })
}

/// New handle for the child at `index` in the archive's native order
///
/// Returns 0 for a negative or out-of-range index.
#[no_mangle]
pub extern "C" fn nx_get_child_by_index(node: u64, index: i32) -> u64 {
    boundary("nx_get_child_by_index", 0, |bridge| {
        let index = usize::try_from(index)
            .map_err(|_| BridgeError::InvalidArgument(format!("negative child index {}", index)))?;
        Ok(bridge.get_child_by_index(handle_arg(node)?, index)?.into_raw())
    })
}

/// Whether a child named `name` exists; false on any failure
///
/// # Safety
/// * `name` must be null or a valid NUL-terminated string
#[no_mangle]
pub unsafe extern "C" fn nx_has_child(node: u64, name: *const c_char) -> bool {
    boundary("nx_has_child", false, |bridge| {
        let name = str_arg(name)?;
        bridge.has_child(handle_arg(node)?, name)
    })
}

/// Read the node's `origin` child, when it exists and is a vector
///
/// # Safety
/// * `x` and `y` must be null or valid for writes
#[no_mangle]
pub unsafe extern "C" fn nx_get_origin(node: u64, x: *mut i32, y: *mut i32) -> bool {
    if x.is_null() || y.is_null() {
        return false;
    }
    match boundary("nx_get_origin", None, |bridge| {
        bridge.get_origin(handle_arg(node)?)
    }) {
        Some(v) => {
            *x = v.x;
            *y = v.y;
            true
        }
        None => false,
    }
}

/// Follow the node's `_outlink`, if any, and return a new handle
///
/// Nodes without a link resolve to a new handle for themselves. Returns 0
/// when the link target cannot be resolved.
#[no_mangle]
pub extern "C" fn nx_resolve_outlink(node: u64) -> u64 {
    boundary("nx_resolve_outlink", 0, |bridge| {
        Ok(bridge.resolve_outlink(handle_arg(node)?)?.into_raw())
    })
}
