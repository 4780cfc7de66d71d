fn main() {
    if let Err(err) = jindex_cli::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
