use std::process::ExitCode;

fn main() -> ExitCode {
    match termnote::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(?err, "termnote exited with an error");
            eprintln!("termnote: {err:#}");
            ExitCode::FAILURE
        }
    }
}
