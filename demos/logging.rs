//! Example demonstrating logging capabilities
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-pretty,logging-json
//! ```

use wireplan::logging::{self, LogOptions};
use wireplan::{Activatable, ArgBag, ClassSpec, Registry, Result};

// Example services
#[allow(dead_code)]
struct Database {
    url: String,
}

impl Activatable for Database {
    fn blueprint() -> ClassSpec {
        ClassSpec::new("Database")
    }
    fn assemble(_bag: &mut ArgBag) -> Result<Self> {
        println!("  [App] Database being created...");
        Ok(Database {
            url: "postgres://localhost/mydb".into(),
        })
    }
}

struct RequestContext;

impl Activatable for RequestContext {
    fn blueprint() -> ClassSpec {
        ClassSpec::new("RequestContext")
    }
    fn assemble(_bag: &mut ArgBag) -> Result<Self> {
        Ok(RequestContext)
    }
}

fn main() -> Result<()> {
    // Show only the engine's own events; a set RUST_LOG still wins.
    logging::install(LogOptions {
        di_only: true,
        ..LogOptions::default()
    });

    println!("=== wireplan Logging Demo ===\n");

    // Registrations log "Registering service" with key and lifetime fields
    let mut registry = Registry::new();
    registry.add_singleton::<Database>()?;
    registry.add_scoped::<RequestContext>()?;

    // Building the provider logs the snapshot generation
    let provider = registry.build_provider();

    // First resolve logs plan compilation, then the singleton build
    let _db = provider.get::<Database>()?;

    // Second resolve logs a singleton cache hit (TRACE level)
    let _db = provider.get::<Database>()?;

    // Scope creation and scoped caching
    let scope = provider.create_scope();
    let _ctx = scope.get::<RequestContext>()?;
    let _ctx = scope.get::<RequestContext>()?;
    drop(scope);

    println!("\nDone - re-run with RUST_LOG=trace for cache-hit details");
    Ok(())
}
