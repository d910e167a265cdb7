fn main() -> std::process::ExitCode {
    launchpad_lib::run()
}
