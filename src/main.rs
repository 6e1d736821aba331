fn main() -> std::process::ExitCode {
    archiflow_client::run()
}
