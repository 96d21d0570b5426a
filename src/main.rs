use clap::Parser;
use git_workspace::cli::Cli;

fn main() {
    let cli = Cli::parse();
    match cli.run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
