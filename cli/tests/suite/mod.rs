// Integration tests for the `syscage` binary.
mod config_file;
mod launch;
