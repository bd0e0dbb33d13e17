// C ABI for the sound pool
// Pools are addressed by integer handles; ids and booleans cross as i32, -1 marks a rejected call.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use soundpool::{
    AudioError, DefaultResolver, LoadCompleteListener, LoadEvent, PoolConfig, ResourceEntry,
    Result, SampleId, SampleSource, SetResult, SoundPool, INVALID_SAMPLE_ID,
};
use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr, CString};
use std::sync::{Arc, Once};

struct PoolEntry {
    pool: SoundPool,
    resolver: Arc<DefaultResolver>,
}

static POOL_REGISTRY: Lazy<Mutex<HashMap<i64, Arc<PoolEntry>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_POOL_ID: Lazy<Mutex<i64>> = Lazy::new(|| Mutex::new(1));
static INIT_LOGGER: Once = Once::new();

fn init_logging() {
    INIT_LOGGER.call_once(|| {
        #[cfg(target_os = "android")]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(log::LevelFilter::Debug)
                    .with_tag("SoundPool"),
            );
        }

        #[cfg(not(target_os = "android"))]
        {
            let _ = env_logger::builder()
                .is_test(false)
                .filter_level(log::LevelFilter::Info)
                .try_init();
        }
    });
}

fn register_pool(entry: PoolEntry) -> i64 {
    let mut next = NEXT_POOL_ID.lock();
    let id = *next;
    *next += 1;
    drop(next);

    POOL_REGISTRY.lock().insert(id, Arc::new(entry));
    id
}

/// Look up a pool; the registry lock is not held while `f` runs
fn with_pool<R>(handle: i64, f: impl FnOnce(&PoolEntry) -> Result<R>) -> Result<R> {
    let entry = POOL_REGISTRY
        .lock()
        .get(&handle)
        .cloned()
        .ok_or_else(|| AudioError::InvalidState("Invalid pool handle".into()))?;
    f(&entry)
}

fn to_code(result: Result<()>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1
        }
    }
}

fn to_flag(result: Result<bool>) -> i32 {
    match result {
        Ok(flag) => flag as i32,
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1
        }
    }
}

fn to_sample_id(result: Result<Option<SampleId>>) -> i32 {
    match result {
        Ok(id) => id.unwrap_or(INVALID_SAMPLE_ID),
        Err(err) => {
            log::error!("FFI error: {}", err);
            INVALID_SAMPLE_ID
        }
    }
}

/// 0 success, -1 not loaded or bad handle, -2 value out of range
fn set_result_code(result: Result<SetResult>) -> i32 {
    match result {
        Ok(SetResult::Success) => 0,
        Ok(SetResult::InvalidOperation) => -1,
        Ok(SetResult::InvalidValue) => -2,
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1
        }
    }
}

fn read_str<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(AudioError::IoError("null path".into()));
    }
    let c_str = unsafe { CStr::from_ptr(ptr) };
    c_str
        .to_str()
        .map_err(|e| AudioError::IoError(format!("path is not UTF-8: {}", e)))
}

fn buffer_size_arg(buffer_size: i32) -> Option<usize> {
    (buffer_size > 0).then_some(buffer_size as usize)
}

/// Load-complete callback: `(user_data, sample_id, success, error or null)`.
/// `error` is only valid for the duration of the call.
pub type LoadCompleteCallback =
    extern "C" fn(user_data: *mut c_void, sample_id: i32, success: i32, error: *const c_char);

struct UserData(*mut c_void);

// The host owns the pointer and promises it may be used from the event thread
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

struct CallbackBridge {
    callback: LoadCompleteCallback,
    user_data: UserData,
}

impl LoadCompleteListener for CallbackBridge {
    fn on_load_complete(&self, event: LoadEvent) {
        let error = event
            .error
            .map(|msg| CString::new(msg.replace('\0', " ")).unwrap_or_default());
        let error_ptr = error.as_ref().map_or(std::ptr::null(), |e| e.as_ptr());
        (self.callback)(self.user_data.0, event.sample_id, event.success as i32, error_ptr);
    }
}

// -------------------------------
// C ABI
// -------------------------------

/// Create a pool; returns a handle, or -1 on failure.
/// `default_buffer_size <= 0` keeps the default.
#[no_mangle]
pub extern "C" fn soundpool_create(max_samples: i32, default_buffer_size: i32) -> i64 {
    init_logging();
    let mut config = PoolConfig::default();
    config.max_samples = max_samples.max(0) as usize;
    if let Some(size) = buffer_size_arg(default_buffer_size) {
        config.default_buffer_size = size;
    }

    let resolver = Arc::new(DefaultResolver::new());
    match SoundPool::with_resolver(config, resolver.clone()) {
        Ok(pool) => register_pool(PoolEntry { pool, resolver }),
        Err(err) => {
            log::error!("Failed to create pool: {}", err);
            -1
        }
    }
}

/// Load a path, `content://` URI or HTTP(S) URL; returns the sample id or -1
#[no_mangle]
pub extern "C" fn soundpool_load(handle: i64, path: *const c_char, buffer_size: i32, is_static: i32) -> i32 {
    to_sample_id(with_pool(handle, |entry| {
        let path = read_str(path)?;
        Ok(entry
            .pool
            .load(SampleSource::from_path(path), buffer_size_arg(buffer_size), is_static != 0))
    }))
}

/// Open a local file synchronously and queue it; -1 if it cannot be opened
#[no_mangle]
pub extern "C" fn soundpool_load_file(handle: i64, path: *const c_char, buffer_size: i32, is_static: i32) -> i32 {
    to_sample_id(with_pool(handle, |entry| {
        let path = read_str(path)?;
        entry
            .pool
            .load_file(path, buffer_size_arg(buffer_size), is_static != 0)
    }))
}

/// Map a resource id to a window of a file; `length < 0` means "to end of file"
#[no_mangle]
pub extern "C" fn soundpool_register_resource(
    handle: i64,
    resource_id: u32,
    path: *const c_char,
    offset: i64,
    length: i64,
) -> i32 {
    to_code(with_pool(handle, |entry| {
        let path = read_str(path)?;
        let resource = if length < 0 {
            ResourceEntry::file(path)
        } else {
            ResourceEntry::packed(path, offset.max(0) as u64, length as u64)
        };
        entry.resolver.resources().register(resource_id, resource)
    }))
}

#[no_mangle]
pub extern "C" fn soundpool_load_resource(handle: i64, resource_id: u32, buffer_size: i32, is_static: i32) -> i32 {
    to_sample_id(with_pool(handle, |entry| {
        Ok(entry.pool.load(
            SampleSource::Resource(resource_id),
            buffer_size_arg(buffer_size),
            is_static != 0,
        ))
    }))
}

#[no_mangle]
pub extern "C" fn soundpool_unload(handle: i64, sample_id: i32) -> i32 {
    to_flag(with_pool(handle, |entry| Ok(entry.pool.unload(sample_id))))
}

#[no_mangle]
pub extern "C" fn soundpool_play(
    handle: i64,
    sample_id: i32,
    left_volume: f32,
    right_volume: f32,
    repeat: i32,
    rate: f32,
) -> i32 {
    to_sample_id(with_pool(handle, |entry| {
        Ok(entry
            .pool
            .play(sample_id, left_volume, right_volume, repeat, rate))
    }))
}

#[no_mangle]
pub extern "C" fn soundpool_play_once(
    handle: i64,
    path: *const c_char,
    left_volume: f32,
    right_volume: f32,
    rate: f32,
) -> i32 {
    to_sample_id(with_pool(handle, |entry| {
        let path = read_str(path)?;
        Ok(entry
            .pool
            .play_once(SampleSource::from_path(path), left_volume, right_volume, rate))
    }))
}

#[no_mangle]
pub extern "C" fn soundpool_pause(handle: i64, sample_id: i32) -> i32 {
    to_flag(with_pool(handle, |entry| Ok(entry.pool.pause(sample_id))))
}

#[no_mangle]
pub extern "C" fn soundpool_resume(handle: i64, sample_id: i32) -> i32 {
    to_flag(with_pool(handle, |entry| Ok(entry.pool.resume(sample_id))))
}

#[no_mangle]
pub extern "C" fn soundpool_stop(handle: i64, sample_id: i32) -> i32 {
    to_flag(with_pool(handle, |entry| Ok(entry.pool.stop(sample_id))))
}

#[no_mangle]
pub extern "C" fn soundpool_set_volume(handle: i64, sample_id: i32, left: f32, right: f32) -> i32 {
    set_result_code(with_pool(handle, |entry| {
        Ok(entry.pool.set_volume(sample_id, left, right))
    }))
}

#[no_mangle]
pub extern "C" fn soundpool_set_rate(handle: i64, sample_id: i32, rate: f32) -> i32 {
    set_result_code(with_pool(handle, |entry| Ok(entry.pool.set_rate(sample_id, rate))))
}

#[no_mangle]
pub extern "C" fn soundpool_set_loop(handle: i64, sample_id: i32, repeat: i32) -> i32 {
    set_result_code(with_pool(handle, |entry| Ok(entry.pool.set_loop(sample_id, repeat))))
}

#[no_mangle]
pub extern "C" fn soundpool_auto_pause(handle: i64) -> i32 {
    to_code(with_pool(handle, |entry| {
        entry.pool.auto_pause();
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn soundpool_auto_resume(handle: i64) -> i32 {
    to_code(with_pool(handle, |entry| {
        entry.pool.auto_resume();
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn soundpool_is_loaded(handle: i64, sample_id: i32) -> i32 {
    to_flag(with_pool(handle, |entry| Ok(entry.pool.is_loaded(sample_id))))
}

#[no_mangle]
pub extern "C" fn soundpool_is_playing(handle: i64, sample_id: i32) -> i32 {
    to_flag(with_pool(handle, |entry| Ok(entry.pool.is_playing(sample_id))))
}

#[no_mangle]
pub extern "C" fn soundpool_is_paused(handle: i64, sample_id: i32) -> i32 {
    to_flag(with_pool(handle, |entry| Ok(entry.pool.is_paused(sample_id))))
}

#[no_mangle]
pub extern "C" fn soundpool_is_stopped(handle: i64, sample_id: i32) -> i32 {
    to_flag(with_pool(handle, |entry| Ok(entry.pool.is_stopped(sample_id))))
}

#[no_mangle]
pub extern "C" fn soundpool_is_any_playing(handle: i64) -> i32 {
    to_flag(with_pool(handle, |entry| Ok(entry.pool.is_any_playing())))
}

/// Register (or clear, with a null callback) the load-complete callback
#[no_mangle]
pub extern "C" fn soundpool_set_load_listener(
    handle: i64,
    callback: Option<LoadCompleteCallback>,
    user_data: *mut c_void,
) -> i32 {
    let user_data = UserData(user_data);
    to_code(with_pool(handle, move |entry| {
        let listener = callback.map(|callback| {
            Arc::new(CallbackBridge {
                callback,
                user_data,
            }) as Arc<dyn LoadCompleteListener>
        });
        entry.pool.set_load_complete_listener(listener);
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn soundpool_release(handle: i64) -> i32 {
    let entry = POOL_REGISTRY.lock().remove(&handle);
    match entry {
        Some(entry) => {
            entry.pool.release();
            0
        }
        None => -1,
    }
}
