//! H.264 Annex B byte stream to MP4 sample conversion.

use crate::foundation::error::{HyperError, HyperResult};

pub const NAL_SLICE: u8 = 1;
pub const NAL_IDR: u8 = 5;
pub const NAL_SEI: u8 = 6;
pub const NAL_SPS: u8 = 7;
pub const NAL_PPS: u8 = 8;
pub const NAL_AUD: u8 = 9;

pub fn nal_type(nal: &[u8]) -> u8 {
    nal.first().map_or(0, |b| b & 0x1f)
}

fn is_vcl(t: u8) -> bool {
    (NAL_SLICE..=NAL_IDR).contains(&t)
}

/// Split an Annex B stream on 3- and 4-byte start codes. Empty units are dropped.
pub fn split_nals(stream: &[u8]) -> Vec<&[u8]> {
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 3 <= stream.len() {
        if stream[i] == 0 && stream[i + 1] == 0 && stream[i + 2] == 1 {
            starts.push(i + 3);
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut out = Vec::with_capacity(starts.len());
    for (k, &s) in starts.iter().enumerate() {
        let mut end = starts.get(k + 1).map_or(stream.len(), |&next| next - 3);
        // Trailing zeros belong to the next 4-byte start code (or are stuffing).
        while end > s && stream[end - 1] == 0 {
            end -= 1;
        }
        if end > s {
            out.push(&stream[s..end]);
        }
    }
    out
}

/// One decodable picture converted to an MP4 sample.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessUnit {
    /// 4-byte big-endian length-prefixed NAL units, parameter sets and delimiters removed.
    pub sample: Vec<u8>,
    pub is_key: bool,
    pub sps: Vec<Vec<u8>>,
    pub pps: Vec<Vec<u8>>,
}

impl AccessUnit {
    fn has_picture(&self) -> bool {
        !self.sample.is_empty()
    }
}

/// Group NAL units into access units.
///
/// A unit boundary is an access unit delimiter, or a parameter set / SEI / new first slice
/// (`first_mb_in_slice == 0`) following a slice.
pub fn access_units(stream: &[u8]) -> Vec<AccessUnit> {
    let mut out = Vec::new();
    let mut cur = AccessUnit::default();
    let mut seen_vcl = false;

    for nal in split_nals(stream) {
        let t = nal_type(nal);
        let first_slice = is_vcl(t) && nal.get(1).is_some_and(|b| b & 0x80 != 0);
        let boundary = t == NAL_AUD
            || (seen_vcl && matches!(t, NAL_SPS | NAL_PPS | NAL_SEI))
            || (seen_vcl && first_slice);
        if boundary && cur.has_picture() {
            out.push(std::mem::take(&mut cur));
            seen_vcl = false;
        }

        match t {
            NAL_AUD => {}
            NAL_SPS => cur.sps.push(nal.to_vec()),
            NAL_PPS => cur.pps.push(nal.to_vec()),
            _ => {
                if is_vcl(t) {
                    seen_vcl = true;
                    cur.is_key |= t == NAL_IDR;
                }
                cur.sample.extend_from_slice(&(nal.len() as u32).to_be_bytes());
                cur.sample.extend_from_slice(nal);
            }
        }
    }
    if cur.has_picture() {
        out.push(cur);
    }
    out
}

/// Build an `AVCDecoderConfigurationRecord` (the `avcC` box payload).
pub fn build_avcc(sps: &[Vec<u8>], pps: &[Vec<u8>]) -> HyperResult<Vec<u8>> {
    let first = sps
        .first()
        .ok_or_else(|| HyperError::external("h264 stream carries no SPS"))?;
    if first.len() < 4 {
        return Err(HyperError::external("h264 SPS is truncated"));
    }
    if pps.is_empty() {
        return Err(HyperError::external("h264 stream carries no PPS"));
    }
    if sps.len() > 31 || pps.len() > 255 {
        return Err(HyperError::external("too many h264 parameter sets"));
    }

    let mut out = vec![1, first[1], first[2], first[3], 0xff, 0xe0 | sps.len() as u8];
    for set in sps {
        let len = u16::try_from(set.len())
            .map_err(|_| HyperError::external("h264 SPS exceeds 65535 bytes"))?;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(set);
    }
    out.push(pps.len() as u8);
    for set in pps {
        let len = u16::try_from(set.len())
            .map_err(|_| HyperError::external("h264 PPS exceeds 65535 bytes"))?;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(set);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/annexb.rs"]
mod tests;
