pub(crate) mod raster;
pub(crate) mod surface_pool;
pub(crate) mod synth;
pub(crate) mod tile;
