#[tokio::main]
async fn main() {
    let code = biotools_annotate::cli::run_cli().await;
    std::process::exit(code);
}
