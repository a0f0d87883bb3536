pub(crate) mod background;
pub(crate) mod image;
pub(crate) mod model;
pub(crate) mod placed;
pub(crate) mod source;
pub(crate) mod text;
pub(crate) mod widget;
