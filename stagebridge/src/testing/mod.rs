//! Test support for external process stages.
//!
//! Stub workers are small POSIX shell programs; test archives are built in
//! memory with the zip writer.

mod fixtures;
mod mocks;

pub use fixtures::{
    build_zip, sh_config, write_script, DIE_AFTER_FIRST, ECHO_INDEX, ENV_GREETING, SENTIMENT,
    SLOW, UPPERCASE,
};
pub use mocks::{FailingStartStage, RecordingStage};
