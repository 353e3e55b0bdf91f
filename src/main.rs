mod cli;
mod lookup;
mod scan;
mod shortcuts;
mod steam;
mod store;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}
