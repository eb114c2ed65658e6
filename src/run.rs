mod cli;
mod util;

pub(crate) use cli::as_cli;
pub(crate) use util::shellexpand;
