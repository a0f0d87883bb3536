pub(crate) mod blend;
pub(crate) mod buffer;
pub(crate) mod ops;
pub(crate) mod svg;
