fn main() {
    match pisa_cli::run() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("{error}");
            for source in error.chain().skip(1) {
                eprintln!("  caused by: {source}");
            }
            std::process::exit(1);
        }
    }
}
