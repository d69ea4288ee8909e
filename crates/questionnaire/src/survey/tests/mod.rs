mod attempts;
pub(crate) mod common;
mod feedback;
