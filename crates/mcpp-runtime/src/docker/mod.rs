//! Container runtime backend driven through the docker CLI.

mod backend;
mod command;
mod parse;

pub use backend::DockerBackend;
