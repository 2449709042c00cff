pub mod compile;
pub mod detect;

use clap::ValueEnum;
use diptych_croquis::{Environment, Mode};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EnvArg {
    Client,
    Server,
}

impl From<EnvArg> for Environment {
    fn from(env: EnvArg) -> Self {
        match env {
            EnvArg::Client => Environment::Client,
            EnvArg::Server => Environment::Server,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Dev,
    Build,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Dev => Mode::Dev,
            ModeArg::Build => Mode::Build,
        }
    }
}
