#![forbid(unsafe_code)]

//! Binary entrypoint for the `tidyarr` command.

use std::process;

#[tokio::main]
async fn main() {
    let code = tidyarr_app::run().await;
    process::exit(code);
}
