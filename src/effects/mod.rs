pub(crate) mod blend;
pub(crate) mod post;
pub(crate) mod sample;
