pub(crate) mod commands;
pub(crate) mod constants;
pub(crate) mod render;
