//! hive-import: copy a sources file to the Atlas node over SSH and run the
//! Hive import hook there.

fn main() {
    if let Err(exit_code) = hive_import::run() {
        std::process::exit(exit_code);
    }
}
