use alfrd::cli;

pub fn main() {
    cli::process_command();
}
