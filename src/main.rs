fn main() {
    std::process::exit(defcheck::cli::run());
}
