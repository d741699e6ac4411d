pub(crate) mod decode;
pub(crate) mod manifest;
pub(crate) mod resolver;
pub(crate) mod source;
