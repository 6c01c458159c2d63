pub(crate) mod interpolate;
pub(crate) mod keyframes;
pub(crate) mod source;
