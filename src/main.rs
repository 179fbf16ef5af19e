//! invoice – renders the embedded example order to a PDF in Downloads.
//!
//! Usage:
//!   invoice
//!
//! Set `RUST_LOG=debug` to follow the individual stages.

use std::process;

use invoice_forge::order::{sample_order, sample_shop};
use invoice_forge::InvoicePipeline;

fn main() {
    env_logger::init();

    let order = sample_order();
    let shop = sample_shop();

    match InvoicePipeline::default().run(&order, &shop) {
        Ok(path) => println!("Invoice PDF saved to: {}", path.display()),
        Err(e) => {
            eprintln!("Error ({}): {e}", e.stage());
            process::exit(1);
        }
    }
}
