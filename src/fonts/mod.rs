pub(crate) mod catalog;
pub(crate) mod face;
pub(crate) mod storage;
