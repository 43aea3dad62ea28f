pub mod app;
pub mod renderer;
pub mod scene;

use clap::error::ErrorKind;
use clap::Parser;
use color_eyre::Result;
use app::args::Args;
use app::App;

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            // Usage goes to stdout, and the process still reports failure
            print!("{}", e.render());
            std::process::exit(1);
        }
    };

    let app = App::new(args.into_config())?;
    app.run()?;

    Ok(())
}
