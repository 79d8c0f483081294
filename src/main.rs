//! staticweb: compile a content tree into a static site.

use anyhow::{Result, bail};
use clap::Parser;
use staticweb::{cli::Cli, compile, config::SiteConfig, log, serve::serve, start_live};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SiteConfig::load(&cli)?;

    if config.live {
        return serve_live(&config);
    }

    if let Err(err) = compile(&config.src, &config.out, None, &config.build) {
        let errors = err.errors();
        for error in &errors {
            log!("error"; "{error}");
        }
        bail!("compile failed with {} error(s)", errors.len());
    }
    Ok(())
}

/// Compile, serve the output and rebuild on change until Ctrl+C.
fn serve_live(config: &SiteConfig) -> Result<()> {
    let live = start_live(&config.src, &config.out, config.build.clone(), |err| {
        for error in err.errors() {
            log!("error"; "{error}");
        }
    })?;

    let served = serve(&config.out, &config.serve);
    live.stop();
    served
}
