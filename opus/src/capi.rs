//! C ABI over integer handles.
//!
//! Hosts that cannot hold Rust values (JVM, .NET, Python via ctypes) drive
//! encoders and decoders through `u64` handle ids. Ids start at 1, grow
//! monotonically and are never handed out twice, so a stale id after close
//! can only ever resolve to "closed". Each handle is serialized by its own
//! lock; distinct handles run in parallel.
//!
//! Every fallible function returns a status (`GIZTOY_OPUS_OK` or one of the
//! negative `GIZTOY_OPUS_ERR_*` values). When the failure came from libopus,
//! [`giztoy_opus_last_error_code`] returns the native status on the calling
//! thread.

use std::cell::Cell;
use std::collections::HashMap;
use std::os::raw::c_int;
use std::slice;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::config::{Application, DecoderConfig, EncoderConfig};
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{ErrorCode, OpusError};
use crate::library;

pub const GIZTOY_OPUS_OK: c_int = 0;
pub const GIZTOY_OPUS_ERR_INVALID_ARGUMENT: c_int = -1;
pub const GIZTOY_OPUS_ERR_BUFFER_TOO_SMALL: c_int = -2;
pub const GIZTOY_OPUS_ERR_LIBRARY_LOAD: c_int = -10;
pub const GIZTOY_OPUS_ERR_INITIALIZATION: c_int = -11;
pub const GIZTOY_OPUS_ERR_CLOSED: c_int = -12;
pub const GIZTOY_OPUS_ERR_CODEC: c_int = -13;

thread_local! {
    static LAST_ERROR_CODE: Cell<c_int> = const { Cell::new(0) };
}

struct Table<T> {
    next: AtomicU64,
    entries: Mutex<HashMap<u64, Arc<Mutex<T>>>>,
}

impl<T> Table<T> {
    fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn insert(&self, value: T) -> u64 {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(id, Arc::new(Mutex::new(value)));
        id
    }

    fn get(&self, id: u64) -> Option<Arc<Mutex<T>>> {
        self.entries.lock().get(&id).cloned()
    }

    fn remove(&self, id: u64) -> Option<Arc<Mutex<T>>> {
        self.entries.lock().remove(&id)
    }
}

static ENCODERS: Lazy<Table<Encoder>> = Lazy::new(Table::new);
static DECODERS: Lazy<Table<Decoder>> = Lazy::new(Table::new);

fn fail(err: &OpusError) -> c_int {
    LAST_ERROR_CODE.with(|c| c.set(err.code().map_or(0, |code| code.raw())));
    match err {
        OpusError::LibraryLoad(_) => GIZTOY_OPUS_ERR_LIBRARY_LOAD,
        OpusError::Initialization { .. } => GIZTOY_OPUS_ERR_INITIALIZATION,
        OpusError::Closed { .. } => GIZTOY_OPUS_ERR_CLOSED,
        OpusError::Codec { .. } => GIZTOY_OPUS_ERR_CODEC,
    }
}

/// Returns a status for a rejection made before libopus was reached.
fn reject(status: c_int) -> c_int {
    LAST_ERROR_CODE.with(|c| c.set(0));
    status
}

fn closed(kind: &'static str) -> c_int {
    fail(&OpusError::Closed { kind })
}

/// Returns the native libopus status of the last failed call on this
/// thread, or 0 if that failure did not come from libopus.
#[unsafe(no_mangle)]
pub extern "C" fn giztoy_opus_last_error_code() -> c_int {
    LAST_ERROR_CODE.with(|c| c.get())
}

/// Loads libopus. Returns `GIZTOY_OPUS_ERR_LIBRARY_LOAD` if it is unusable.
#[unsafe(no_mangle)]
pub extern "C" fn giztoy_opus_init() -> c_int {
    match library::load() {
        Ok(_) => GIZTOY_OPUS_OK,
        Err(e) => fail(&e),
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Creates an encoder and stores its id in `out_handle`.
///
/// `application` is 2048 (VoIP), 2049 (audio) or 2051 (restricted low delay).
///
/// # Safety
///
/// `out_handle` must be null or valid for a `u64` write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn giztoy_opus_encoder_create(
    sample_rate: i32,
    stereo: bool,
    max_output_size: i32,
    application: c_int,
    out_handle: *mut u64,
) -> c_int {
    if out_handle.is_null() || max_output_size <= 0 {
        return reject(GIZTOY_OPUS_ERR_INVALID_ARGUMENT);
    }
    let Some(application) = Application::from_raw(application) else {
        return fail(&OpusError::Initialization { kind: "encoder", code: ErrorCode::BadArg });
    };

    let config = EncoderConfig::new(sample_rate, stereo, max_output_size as usize, application);
    match Encoder::new(config) {
        Ok(encoder) => {
            unsafe { *out_handle = ENCODERS.insert(encoder) };
            GIZTOY_OPUS_OK
        }
        Err(e) => fail(&e),
    }
}

/// Encodes `pcm_len` interleaved samples into `out`, storing the packet
/// length in `out_len`.
///
/// # Safety
///
/// `pcm` must be valid for `pcm_len` reads, `out` for `out_cap` writes and
/// `out_len` for a `usize` write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn giztoy_opus_encoder_encode(
    handle: u64,
    pcm: *const i16,
    pcm_len: usize,
    out: *mut u8,
    out_cap: usize,
    out_len: *mut usize,
) -> c_int {
    if (pcm.is_null() && pcm_len > 0) || out.is_null() || out_len.is_null() {
        return reject(GIZTOY_OPUS_ERR_INVALID_ARGUMENT);
    }
    let Some(entry) = ENCODERS.get(handle) else {
        return closed("encoder");
    };

    let pcm = if pcm_len == 0 {
        &[][..]
    } else {
        unsafe { slice::from_raw_parts(pcm, pcm_len) }
    };
    let out = unsafe { slice::from_raw_parts_mut(out, out_cap) };
    match entry.lock().encode_to(pcm, out) {
        Ok(n) => {
            unsafe { *out_len = n };
            GIZTOY_OPUS_OK
        }
        Err(e) => fail(&e),
    }
}

/// Sets the encoder bitrate (-1000 auto, -1 max, or bits per second).
/// Unknown or closed handles are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn giztoy_opus_encoder_set_bitrate(handle: u64, bitrate: i32) -> c_int {
    let Some(entry) = ENCODERS.get(handle) else {
        return GIZTOY_OPUS_OK;
    };
    match entry.lock().set_bitrate(bitrate) {
        Ok(()) => GIZTOY_OPUS_OK,
        Err(e) => fail(&e),
    }
}

/// Stores the effective bitrate in `out_bitrate`.
///
/// # Safety
///
/// `out_bitrate` must be null or valid for an `i32` write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn giztoy_opus_encoder_get_bitrate(
    handle: u64,
    out_bitrate: *mut i32,
) -> c_int {
    if out_bitrate.is_null() {
        return reject(GIZTOY_OPUS_ERR_INVALID_ARGUMENT);
    }
    let Some(entry) = ENCODERS.get(handle) else {
        return closed("encoder");
    };
    match entry.lock().get_bitrate() {
        Ok(bitrate) => {
            unsafe { *out_bitrate = bitrate.to_raw() };
            GIZTOY_OPUS_OK
        }
        Err(e) => fail(&e),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn giztoy_opus_encoder_reset(handle: u64) {
    if let Some(entry) = ENCODERS.get(handle) {
        entry.lock().reset();
    }
}

/// Releases the encoder. Unknown or already closed handles are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn giztoy_opus_encoder_close(handle: u64) {
    if let Some(entry) = ENCODERS.remove(handle) {
        entry.lock().close();
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn giztoy_opus_encoder_is_open(handle: u64) -> bool {
    ENCODERS.get(handle).is_some_and(|entry| entry.lock().is_open())
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Creates a decoder and stores its id in `out_handle`.
///
/// # Safety
///
/// `out_handle` must be null or valid for a `u64` write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn giztoy_opus_decoder_create(
    sample_rate: i32,
    stereo: bool,
    frame_size: i32,
    out_handle: *mut u64,
) -> c_int {
    if out_handle.is_null() || frame_size <= 0 {
        return reject(GIZTOY_OPUS_ERR_INVALID_ARGUMENT);
    }

    match Decoder::new(DecoderConfig::new(sample_rate, stereo, frame_size as usize)) {
        Ok(decoder) => {
            unsafe { *out_handle = DECODERS.insert(decoder) };
            GIZTOY_OPUS_OK
        }
        Err(e) => fail(&e),
    }
}

/// Decodes one packet into `out`, which must hold `frame_size * channels`
/// samples. The number of samples written is stored in `out_len`. A null
/// or empty packet runs packet loss concealment.
///
/// # Safety
///
/// `data` must be null or valid for `data_len` reads, `out` for `out_cap`
/// writes and `out_len` for a `usize` write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn giztoy_opus_decoder_decode(
    handle: u64,
    data: *const u8,
    data_len: usize,
    out: *mut i16,
    out_cap: usize,
    out_len: *mut usize,
) -> c_int {
    if out.is_null() || out_len.is_null() {
        return reject(GIZTOY_OPUS_ERR_INVALID_ARGUMENT);
    }
    let Some(entry) = DECODERS.get(handle) else {
        return closed("decoder");
    };

    let data = if data.is_null() || data_len == 0 {
        &[][..]
    } else {
        unsafe { slice::from_raw_parts(data, data_len) }
    };

    let mut decoder = entry.lock();
    let needed = decoder.config().buffer_len();
    if out_cap < needed {
        return reject(GIZTOY_OPUS_ERR_BUFFER_TOO_SMALL);
    }
    match decoder.decode(data) {
        Ok(pcm) => {
            let out = unsafe { slice::from_raw_parts_mut(out, needed) };
            out.copy_from_slice(&pcm);
            unsafe { *out_len = needed };
            GIZTOY_OPUS_OK
        }
        Err(e) => fail(&e),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn giztoy_opus_decoder_reset(handle: u64) {
    if let Some(entry) = DECODERS.get(handle) {
        entry.lock().reset();
    }
}

/// Releases the decoder. Unknown or already closed handles are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn giztoy_opus_decoder_close(handle: u64) {
    if let Some(entry) = DECODERS.remove(handle) {
        entry.lock().close();
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn giztoy_opus_decoder_is_open(handle: u64) -> bool {
    DECODERS.get(handle).is_some_and(|entry| entry.lock().is_open())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi;

    fn create_encoder() -> u64 {
        let mut id = 0u64;
        let ret = unsafe { giztoy_opus_encoder_create(48000, false, 960, 2048, &mut id) };
        assert_eq!(ret, GIZTOY_OPUS_OK);
        assert_ne!(id, 0);
        id
    }

    fn create_decoder(frame_size: i32) -> u64 {
        let mut id = 0u64;
        let ret = unsafe { giztoy_opus_decoder_create(48000, false, frame_size, &mut id) };
        assert_eq!(ret, GIZTOY_OPUS_OK);
        id
    }

    fn encode(id: u64, pcm: &[i16]) -> (c_int, Vec<u8>) {
        let mut out = vec![0u8; 960];
        let mut n = 0usize;
        let ret = unsafe {
            giztoy_opus_encoder_encode(
                id,
                pcm.as_ptr(),
                pcm.len(),
                out.as_mut_ptr(),
                out.len(),
                &mut n,
            )
        };
        out.truncate(n);
        (ret, out)
    }

    fn decode(id: u64, data: &[u8], cap: usize) -> (c_int, Vec<i16>) {
        let mut out = vec![0i16; cap];
        let mut n = 0usize;
        let ret = unsafe {
            giztoy_opus_decoder_decode(
                id,
                data.as_ptr(),
                data.len(),
                out.as_mut_ptr(),
                out.len(),
                &mut n,
            )
        };
        out.truncate(n);
        (ret, out)
    }

    #[test]
    fn test_init() {
        assert_eq!(giztoy_opus_init(), GIZTOY_OPUS_OK);
    }

    #[test]
    fn test_roundtrip() {
        let enc = create_encoder();
        let dec = create_decoder(960);

        assert_eq!(giztoy_opus_encoder_set_bitrate(enc, 50_000), GIZTOY_OPUS_OK);
        let mut bitrate = 0;
        assert_eq!(unsafe { giztoy_opus_encoder_get_bitrate(enc, &mut bitrate) }, GIZTOY_OPUS_OK);
        assert!(bitrate > 0);

        let (ret, packet) = encode(enc, &[0i16; 960]);
        assert_eq!(ret, GIZTOY_OPUS_OK);
        assert!(!packet.is_empty());

        let (ret, pcm) = decode(dec, &packet, 960);
        assert_eq!(ret, GIZTOY_OPUS_OK);
        assert_eq!(pcm.len(), 960);

        giztoy_opus_encoder_close(enc);
        giztoy_opus_decoder_close(dec);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let a = create_encoder();
        giztoy_opus_encoder_close(a);
        let b = create_encoder();
        assert_ne!(a, b);
        assert!(!giztoy_opus_encoder_is_open(a));
        assert!(giztoy_opus_encoder_is_open(b));
        giztoy_opus_encoder_close(b);
    }

    #[test]
    fn test_closed_encoder_gating() {
        let enc = create_encoder();
        giztoy_opus_encoder_close(enc);
        giztoy_opus_encoder_close(enc);
        giztoy_opus_encoder_reset(enc);
        assert!(!giztoy_opus_encoder_is_open(enc));

        assert_eq!(encode(enc, &[0i16; 960]).0, GIZTOY_OPUS_ERR_CLOSED);
        let mut bitrate = 0;
        let ret = unsafe { giztoy_opus_encoder_get_bitrate(enc, &mut bitrate) };
        assert_eq!(ret, GIZTOY_OPUS_ERR_CLOSED);
        assert_eq!(giztoy_opus_encoder_set_bitrate(enc, 50_000), GIZTOY_OPUS_OK);
    }

    #[test]
    fn test_closed_decoder_gating() {
        let dec = create_decoder(960);
        giztoy_opus_decoder_close(dec);
        giztoy_opus_decoder_close(dec);
        giztoy_opus_decoder_reset(dec);
        assert!(!giztoy_opus_decoder_is_open(dec));
        assert_eq!(decode(dec, &[1, 2, 3], 960).0, GIZTOY_OPUS_ERR_CLOSED);
    }

    #[test]
    fn test_codec_errors_report_native_code() {
        let enc = create_encoder();
        assert_eq!(encode(enc, &[0i16; 444]).0, GIZTOY_OPUS_ERR_CODEC);
        assert_eq!(giztoy_opus_last_error_code(), ffi::OPUS_BAD_ARG);
        assert!(giztoy_opus_encoder_is_open(enc));
        giztoy_opus_encoder_close(enc);

        let dec = create_decoder(960);
        assert_eq!(decode(dec, &[0u8; 3000], 960).0, GIZTOY_OPUS_ERR_CODEC);
        assert_eq!(giztoy_opus_last_error_code(), ffi::OPUS_INVALID_PACKET);
        assert!(giztoy_opus_decoder_is_open(dec));
        giztoy_opus_decoder_close(dec);
    }

    #[test]
    fn test_create_errors() {
        let mut id = 0u64;
        let ret = unsafe { giztoy_opus_encoder_create(44100, false, 960, 2048, &mut id) };
        assert_eq!(ret, GIZTOY_OPUS_ERR_INITIALIZATION);
        assert_eq!(giztoy_opus_last_error_code(), ffi::OPUS_BAD_ARG);

        let ret = unsafe { giztoy_opus_encoder_create(48000, false, 960, 1234, &mut id) };
        assert_eq!(ret, GIZTOY_OPUS_ERR_INITIALIZATION);

        let ret =
            unsafe { giztoy_opus_encoder_create(48000, false, 960, 2048, std::ptr::null_mut()) };
        assert_eq!(ret, GIZTOY_OPUS_ERR_INVALID_ARGUMENT);

        let ret = unsafe { giztoy_opus_decoder_create(48000, true, 0, &mut id) };
        assert_eq!(ret, GIZTOY_OPUS_ERR_INVALID_ARGUMENT);
    }

    #[test]
    fn test_rejections_clear_native_code() {
        let dec = create_decoder(960);
        assert_eq!(decode(dec, &[0u8; 3000], 960).0, GIZTOY_OPUS_ERR_CODEC);
        assert_eq!(giztoy_opus_last_error_code(), ffi::OPUS_INVALID_PACKET);

        assert_eq!(decode(dec, &[], 100).0, GIZTOY_OPUS_ERR_BUFFER_TOO_SMALL);
        assert_eq!(giztoy_opus_last_error_code(), 0);

        assert_eq!(decode(dec, &[0u8; 3000], 960).0, GIZTOY_OPUS_ERR_CODEC);
        let ret = unsafe { giztoy_opus_decoder_create(48000, false, 960, std::ptr::null_mut()) };
        assert_eq!(ret, GIZTOY_OPUS_ERR_INVALID_ARGUMENT);
        assert_eq!(giztoy_opus_last_error_code(), 0);
        giztoy_opus_decoder_close(dec);
    }

    #[test]
    fn test_decode_output_too_small() {
        let dec = create_decoder(1200);
        assert_eq!(decode(dec, &[], 960).0, GIZTOY_OPUS_ERR_BUFFER_TOO_SMALL);
        let (ret, pcm) = decode(dec, &[], 1200);
        assert_eq!(ret, GIZTOY_OPUS_OK);
        assert_eq!(pcm.len(), 1200);
        giztoy_opus_decoder_close(dec);
    }

    #[test]
    fn test_handles_in_parallel() {
        let threads: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    let enc = create_encoder();
                    for _ in 0..20 {
                        assert_eq!(encode(enc, &[0i16; 960]).0, GIZTOY_OPUS_OK);
                    }
                    giztoy_opus_encoder_close(enc);
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
    }
}
