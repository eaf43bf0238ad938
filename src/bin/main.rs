use colored::Colorize;

#[tokio::main]
async fn main() {
    if let Err(err) = termclass::cli::main().await {
        eprintln!("{} {err}", "error:".red().bold());
        std::process::exit(1);
    }
}
