pub(crate) mod durable;
pub(crate) mod memory;
