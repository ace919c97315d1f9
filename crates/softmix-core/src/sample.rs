//! Sample codec
//!
//! External samples are what callers upload and what the output stream
//! carries: 8-bit offset-binary (silence = 0x80) or native-endian signed
//! 16-bit. Internal samples are always signed: i8 or native-endian i16.
//! The 8-bit bias flip is its own inverse, so external → internal →
//! external reproduces the input exactly.
//!
//! All readers take a slice that starts at the sample; callers guarantee
//! `bytes.len() >= bpc`.

/// Signed 16-bit clipping bounds
pub const S16_MAX: f32 = i16::MAX as f32;
pub const S16_MIN: f32 = i16::MIN as f32;

/// Signed 8-bit clipping bounds
pub const S8_MAX: f32 = i8::MAX as f32;
pub const S8_MIN: f32 = i8::MIN as f32;

/// Read one external sample into the signed domain
#[inline]
pub fn from_external(bytes: &[u8], bpc: usize) -> i32 {
    if bpc == 2 {
        i16::from_ne_bytes([bytes[0], bytes[1]]) as i32
    } else {
        bytes[0] as i32 - 128
    }
}

/// Read one internal sample
#[inline]
pub fn from_internal(bytes: &[u8], bpc: usize) -> i32 {
    if bpc == 2 {
        i16::from_ne_bytes([bytes[0], bytes[1]]) as i32
    } else {
        bytes[0] as i8 as i32
    }
}

/// Write one signed sample in external representation
#[inline]
pub fn to_external(dst: &mut [u8], bpc: usize, samp: i32) {
    if bpc == 2 {
        dst[..2].copy_from_slice(&(samp as i16).to_ne_bytes());
    } else {
        dst[0] = (samp as u8) ^ 0x80;
    }
}

/// Write one signed sample in internal representation
#[inline]
pub fn to_internal(dst: &mut [u8], bpc: usize, samp: i32) {
    if bpc == 2 {
        dst[..2].copy_from_slice(&(samp as i16).to_ne_bytes());
    } else {
        dst[0] = samp as i8 as u8;
    }
}

/// Read an internal sample at `offset`, or silence if it would run past
/// the end of `data`
#[inline]
pub fn internal_at(data: &[u8], offset: usize, bpc: usize) -> f32 {
    match data.get(offset..offset + bpc) {
        Some(bytes) => from_internal(bytes, bpc) as f32,
        None => 0.0,
    }
}

/// Clamp a mixed value to the signed range of the output width
#[inline]
pub fn clip(value: f32, bpc: usize) -> i32 {
    let (min, max) = if bpc == 2 { (S16_MIN, S16_MAX) } else { (S8_MIN, S8_MAX) };
    value.clamp(min, max) as i32
}

/// Flip 8-bit samples between offset-binary and signed in place
pub fn flip_bias(data: &mut [u8]) {
    for byte in data.iter_mut() {
        *byte ^= 0x80;
    }
}
