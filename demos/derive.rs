//! Example demonstrating the #[derive(Activatable)] macro
//!
//! Run with:
//!   cargo run --example derive --features derive

use std::sync::Arc;
use wireplan::{Activatable, ArgBag, ClassSpec, Registry, Result};

// Dependencies
struct Database {
    url: String,
}

impl Activatable for Database {
    fn blueprint() -> ClassSpec {
        ClassSpec::new("Database")
    }
    fn assemble(_bag: &mut ArgBag) -> Result<Self> {
        Ok(Database {
            url: "postgres://localhost:5432/myapp".into(),
        })
    }
}

struct Cache {
    size: usize,
}

impl Activatable for Cache {
    fn blueprint() -> ClassSpec {
        ClassSpec::new("Cache")
    }
    fn assemble(_bag: &mut ArgBag) -> Result<Self> {
        Ok(Cache { size: 1024 })
    }
}

#[allow(dead_code)]
struct Metrics {
    endpoint: String,
}

// Service wired through the derive macro
#[derive(Activatable)]
struct UserService {
    #[dep]
    db: Arc<Database>,
    #[dep]
    cache: Arc<Cache>,
    #[dep(optional)]
    metrics: Option<Arc<Metrics>>,
    // Non-dependency field uses Default
    request_count: u64,
}

impl UserService {
    fn describe(&self) -> String {
        let metrics_status = if self.metrics.is_some() {
            "with metrics"
        } else {
            "without metrics"
        };
        format!(
            "UserService connected to {} with cache size {} ({}, requests: {})",
            self.db.url, self.cache.size, metrics_status, self.request_count
        )
    }
}

// Nested wiring: the controller pulls the derived service by type
#[derive(Activatable)]
struct ApiController {
    #[dep]
    user_service: Arc<UserService>,
    #[dep]
    db: Arc<Database>,
}

fn main() -> Result<()> {
    println!("=== wireplan Derive Macro Demo ===\n");

    let mut registry = Registry::new();
    registry.add_singleton::<Database>()?;
    registry.add_singleton::<Cache>()?;
    registry.add_transient::<UserService>()?;
    registry.add_transient::<ApiController>()?;
    // Note: Metrics is NOT registered, so the optional stays None

    let provider = registry.build_provider();

    println!("Resolving UserService...");
    let user_service = provider.get::<UserService>()?;
    println!("  {}", user_service.describe());

    println!("Resolving ApiController...");
    let controller = provider.get::<ApiController>()?;
    println!(
        "  controller db == service db: {}",
        Arc::ptr_eq(&controller.db, &controller.user_service.db)
    );

    Ok(())
}
