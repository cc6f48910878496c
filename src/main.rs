use std::process;

fn main() {
    if let Err(e) = quorum::cli::main() {
        eprintln!("❌ Error: {e}");
        process::exit(1);
    }
}
