//! Minimal single-track MP4 (ISO BMFF) writer.
//!
//! Layout: `ftyp`, `moov`, `mdat`. All samples live in one chunk at the start of `mdat`.

use crate::encode::encoder::{ChunkMetadata, ChunkSink, CodecProfile, EncodedChunk};
use crate::foundation::core::Fps;
use crate::foundation::error::{HyperError, HyperResult};

const MOVIE_TIMESCALE: u32 = 1000;
const TRACK_ID: u32 = 1;
const UNITY_MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];
/// Packed ISO-639-2 code for "und".
const LANGUAGE_UND: u16 = 0x55c4;

/// Big-endian box writer with nested size back-patching.
#[derive(Debug, Default)]
pub struct BoxWriter {
    buf: Vec<u8>,
    open: Vec<usize>,
}

impl BoxWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, tag: &[u8; 4]) -> &mut Self {
        self.open.push(self.buf.len());
        self.buf.extend_from_slice(&[0; 4]);
        self.buf.extend_from_slice(tag);
        self
    }

    /// Begin a full box (version + 24-bit flags).
    pub fn begin_full(&mut self, tag: &[u8; 4], version: u8, flags: u32) -> &mut Self {
        self.begin(tag);
        self.u32((u32::from(version) << 24) | (flags & 0x00ff_ffff))
    }

    pub fn end(&mut self) -> HyperResult<&mut Self> {
        let start = self
            .open
            .pop()
            .ok_or_else(|| HyperError::precondition("mp4 box end without begin"))?;
        let size = u32::try_from(self.buf.len() - start)
            .map_err(|_| HyperError::validation("mp4 box exceeds 4 GiB"))?;
        self.buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
        Ok(self)
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    pub fn zeros(&mut self, n: usize) -> &mut Self {
        self.buf.resize(self.buf.len() + n, 0);
        self
    }

    pub fn finish(self) -> HyperResult<Vec<u8>> {
        if !self.open.is_empty() {
            return Err(HyperError::precondition(format!(
                "{} mp4 box(es) left open",
                self.open.len()
            )));
        }
        Ok(self.buf)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MuxerConfig {
    pub codec: CodecProfile,
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
}

/// Collects encoded chunks and assembles the container.
#[derive(Debug)]
pub struct Mp4Muxer {
    cfg: MuxerConfig,
    chunks: Vec<EncodedChunk>,
    decoder_config: Option<Vec<u8>>,
}

impl Mp4Muxer {
    pub fn new(cfg: MuxerConfig) -> Self {
        Self {
            cfg,
            chunks: Vec::new(),
            decoder_config: None,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn add_chunk(&mut self, chunk: EncodedChunk, meta: Option<ChunkMetadata>) {
        if self.decoder_config.is_none()
            && let Some(cfg) = meta.and_then(|m| m.decoder_config)
        {
            self.decoder_config = Some(cfg);
        }
        self.chunks.push(chunk);
    }

    /// Write `ftyp`, `moov` and `mdat` into one buffer.
    pub fn finish(self) -> HyperResult<Vec<u8>> {
        if self.chunks.is_empty() {
            return Err(HyperError::precondition("no encoded chunks to mux"));
        }
        if self.cfg.codec == CodecProfile::H264Main && self.decoder_config.is_none() {
            return Err(HyperError::external(
                "h264 stream finished without a decoder configuration",
            ));
        }

        let data_len: u64 = self.chunks.iter().map(|c| c.data.len() as u64).sum();
        let ftyp = ftyp()?;

        // moov size does not depend on the offset value, only on its width.
        let probe_len = self.moov(0, false)?.len() as u64;
        let mdat_header = if data_len + 8 > u64::from(u32::MAX) {
            16
        } else {
            8
        };
        let wide = ftyp.len() as u64 + probe_len + mdat_header + data_len > u64::from(u32::MAX);
        let moov_len = if wide {
            self.moov(0, true)?.len() as u64
        } else {
            probe_len
        };
        let data_offset = ftyp.len() as u64 + moov_len + mdat_header;
        let moov = self.moov(data_offset, wide)?;

        let mut out = Vec::with_capacity((data_offset + data_len) as usize);
        out.extend_from_slice(&ftyp);
        out.extend_from_slice(&moov);
        if mdat_header == 16 {
            out.extend_from_slice(&1u32.to_be_bytes());
            out.extend_from_slice(b"mdat");
            out.extend_from_slice(&(data_len + 16).to_be_bytes());
        } else {
            out.extend_from_slice(&((data_len + 8) as u32).to_be_bytes());
            out.extend_from_slice(b"mdat");
        }
        for c in &self.chunks {
            out.extend_from_slice(&c.data);
        }
        tracing::debug!(
            samples = self.chunks.len(),
            bytes = out.len(),
            "mp4 container assembled"
        );
        Ok(out)
    }

    fn moov(&self, data_offset: u64, wide_offsets: bool) -> HyperResult<Vec<u8>> {
        let cfg = self.cfg;
        let timescale = cfg.fps.num;
        let deltas: Vec<u32> = self
            .chunks
            .iter()
            .map(|c| us_to_ticks(c.duration_us, timescale))
            .collect();
        let media_duration: u64 = deltas.iter().map(|&d| u64::from(d)).sum();
        let movie_duration = media_duration * u64::from(MOVIE_TIMESCALE) / u64::from(timescale);
        let movie_duration = u32::try_from(movie_duration)
            .map_err(|_| HyperError::validation("mp4 duration exceeds 32-bit range"))?;
        let media_duration = u32::try_from(media_duration)
            .map_err(|_| HyperError::validation("mp4 media duration exceeds 32-bit range"))?;

        let mut w = BoxWriter::new();
        w.begin(b"moov");

        w.begin_full(b"mvhd", 0, 0)
            .u32(0)
            .u32(0)
            .u32(MOVIE_TIMESCALE)
            .u32(movie_duration)
            .u32(0x0001_0000)
            .u16(0x0100)
            .zeros(2 + 8);
        for m in UNITY_MATRIX {
            w.u32(m);
        }
        w.zeros(24).u32(TRACK_ID + 1);
        w.end()?;

        w.begin(b"trak");
        w.begin_full(b"tkhd", 0, 0x7)
            .u32(0)
            .u32(0)
            .u32(TRACK_ID)
            .u32(0)
            .u32(movie_duration)
            .zeros(8)
            .u16(0)
            .u16(0)
            .u16(0)
            .u16(0);
        for m in UNITY_MATRIX {
            w.u32(m);
        }
        w.u32(cfg.width << 16).u32(cfg.height << 16);
        w.end()?;

        w.begin(b"mdia");
        w.begin_full(b"mdhd", 0, 0)
            .u32(0)
            .u32(0)
            .u32(timescale)
            .u32(media_duration)
            .u16(LANGUAGE_UND)
            .u16(0);
        w.end()?;
        w.begin_full(b"hdlr", 0, 0)
            .u32(0)
            .bytes(b"vide")
            .zeros(12)
            .bytes(b"VideoHandler\0");
        w.end()?;

        w.begin(b"minf");
        w.begin_full(b"vmhd", 0, 1).zeros(8);
        w.end()?;
        w.begin(b"dinf");
        w.begin_full(b"dref", 0, 0).u32(1);
        w.begin_full(b"url ", 0, 1);
        w.end()?;
        w.end()?;
        w.end()?;

        w.begin(b"stbl");
        self.write_stsd(&mut w)?;
        write_stts(&mut w, &deltas)?;
        if self.chunks.iter().any(|c| !c.is_key) {
            w.begin_full(b"stss", 0, 0);
            let keys: Vec<u32> = (1u32..)
                .zip(&self.chunks)
                .filter(|(_, c)| c.is_key)
                .map(|(n, _)| n)
                .collect();
            w.u32(keys.len() as u32);
            for n in keys {
                w.u32(n);
            }
            w.end()?;
        }
        w.begin_full(b"stsc", 0, 0)
            .u32(1)
            .u32(1)
            .u32(self.chunks.len() as u32)
            .u32(1);
        w.end()?;
        w.begin_full(b"stsz", 0, 0)
            .u32(0)
            .u32(self.chunks.len() as u32);
        for c in &self.chunks {
            let size = u32::try_from(c.data.len())
                .map_err(|_| HyperError::validation("mp4 sample exceeds 4 GiB"))?;
            w.u32(size);
        }
        w.end()?;
        if wide_offsets {
            w.begin_full(b"co64", 0, 0).u32(1).u64(data_offset);
        } else {
            let off = u32::try_from(data_offset)
                .map_err(|_| HyperError::validation("mp4 chunk offset exceeds 32-bit range"))?;
            w.begin_full(b"stco", 0, 0).u32(1).u32(off);
        }
        w.end()?;
        w.end()?; // stbl

        w.end()?; // minf
        w.end()?; // mdia
        w.end()?; // trak
        w.end()?; // moov
        w.finish()
    }

    fn write_stsd(&self, w: &mut BoxWriter) -> HyperResult<()> {
        let cfg = self.cfg;
        let mut compressor = [0u8; 32];
        let name = cfg.codec.label().as_bytes();
        compressor[0] = name.len() as u8;
        compressor[1..=name.len()].copy_from_slice(name);

        w.begin_full(b"stsd", 0, 0).u32(1);
        w.begin(&cfg.codec.fourcc())
            .zeros(6)
            .u16(1)
            .zeros(16)
            .u16(cfg.width as u16)
            .u16(cfg.height as u16)
            .u32(0x0048_0000)
            .u32(0x0048_0000)
            .u32(0)
            .u16(1)
            .bytes(&compressor)
            .u16(0x0018)
            .u16(0xffff);
        if let Some(avcc) = self.decoder_config.as_deref()
            && cfg.codec == CodecProfile::H264Main
        {
            w.begin(b"avcC").bytes(avcc);
            w.end()?;
        }
        w.end()?;
        w.end()?;
        Ok(())
    }
}

impl ChunkSink for Mp4Muxer {
    fn push_chunk(&mut self, chunk: EncodedChunk, meta: Option<ChunkMetadata>) -> HyperResult<()> {
        self.add_chunk(chunk, meta);
        Ok(())
    }
}

/// The 24-byte `ftyp`: major `mp42`, minor 0, compatible `mp42` + `isom`.
fn ftyp() -> HyperResult<Vec<u8>> {
    let mut w = BoxWriter::new();
    w.begin(b"ftyp").bytes(b"mp42").u32(0).bytes(b"mp42").bytes(b"isom");
    w.end()?;
    w.finish()
}

fn write_stts(w: &mut BoxWriter, deltas: &[u32]) -> HyperResult<()> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for &d in deltas {
        match runs.last_mut() {
            Some((count, delta)) if *delta == d => *count += 1,
            _ => runs.push((1, d)),
        }
    }
    w.begin_full(b"stts", 0, 0).u32(runs.len() as u32);
    for (count, delta) in runs {
        w.u32(count).u32(delta);
    }
    w.end()?;
    Ok(())
}

/// Microseconds to media ticks, rounded to nearest.
fn us_to_ticks(us: u64, timescale: u32) -> u32 {
    let ticks = (u128::from(us) * u128::from(timescale) + 500_000) / 1_000_000;
    ticks.min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
#[path = "../../tests/unit/encode/mp4.rs"]
mod tests;
