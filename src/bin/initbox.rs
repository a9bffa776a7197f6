fn main() {
    match initbox::cli::run() {
        // Only --check returns; a completed boot ends in image replacement.
        Ok(_) => {}
        Err(e) => {
            eprintln!("initbox: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}
