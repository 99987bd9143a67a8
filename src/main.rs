// Entrypoint for the CLI application.
// Keeps `main` small: set up logging, parse arguments and hand them to the
// command dispatcher in `ui`.

use clap::Parser;
use vimeo_uploader::{init_tracing, ui};

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = ui::Cli::parse();
    ui::run(cli)
}
