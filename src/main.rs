use std::process;

fn main() {
    if let Err(err) = streameval::app::run() {
        eprintln!("fatal: {err:#}");
        process::exit(1);
    }
}
