pub(crate) mod annexb;
pub(crate) mod encoder;
pub(crate) mod ffmpeg;
pub(crate) mod mp4;
pub(crate) mod png_codec;
