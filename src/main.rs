use std::process::ExitCode;

fn main() -> ExitCode {
    regionreel_lib::run()
}
