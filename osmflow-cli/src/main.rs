//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = osmflow_cli::run() {
        eprintln!("osmflow: {err}");
        std::process::exit(1);
    }
}
