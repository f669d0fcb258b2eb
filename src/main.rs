fn main() {
    if let Err(err) = csv2sqlite::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
