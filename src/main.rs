fn main() -> std::process::ExitCode {
    mri_analyzer_lib::run()
}
