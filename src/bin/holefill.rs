//! holefill: replace every `.?.` in a file with a model completion.
//!
//! ```bash
//! holefill src/main.rs
//! holefill src/main.rs src/main.mini.rs g
//! ```

use std::process;

use chatsh::holefill::{FillOutcome, HolefillArgs, HolefillPaths, USAGE, fill_hole};
use chatsh::{ChatSession, ChatshConfig, PlainTextRenderer, Renderer, backend_for};

#[tokio::main]
async fn main() {
    let Some(args) = HolefillArgs::parse(std::env::args().skip(1)) else {
        println!("{USAGE}");
        process::exit(1);
    };
    let mut renderer = PlainTextRenderer::new();
    match run(&args, &mut renderer).await {
        Ok(FillOutcome::Filled(_)) => {}
        Ok(FillOutcome::NoHole) => {
            renderer.print_info("No hole found.");
            process::exit(1);
        }
        Err(err) => {
            renderer.print_error(&err.to_string());
            process::exit(1);
        }
    }
}

async fn run(args: &HolefillArgs, renderer: &mut PlainTextRenderer) -> chatsh::Result<FillOutcome> {
    let home = dirs::home_dir()
        .ok_or_else(|| chatsh::Error::configuration("could not determine the home directory"))?;
    let config = ChatshConfig::load()?;
    let spec = config.resolve_model(Some(&args.model))?;
    let backend = backend_for(spec.vendor, config.secrets(), config.base_url(spec.vendor))?;
    let mut session = ChatSession::new(backend, spec.model.clone()).with_catalog(config.catalog.clone());
    fill_hole(
        args,
        &spec.model,
        &mut session,
        &HolefillPaths::for_home(home),
        renderer,
    )
    .await
}
