fn main() {
    if let Err(err) = spacewarp_lib::run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
