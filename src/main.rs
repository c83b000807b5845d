use pruner_core::PrunerConfig;
use soak_test::{soak_scaling, soak_sessions};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(env_filter)
        .init();
}

fn main() {
    init_tracing();
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            std::process::exit(1);
        }
    };
    let violations = rt.block_on(async_main());
    if violations > 0 {
        eprintln!("\n✗ {violations} invariant violation(s), see log output");
        std::process::exit(1);
    }
}

async fn async_main() -> usize {
    let mut violations = 0;

    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            PRUNER SOAK TESTS                               ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    // Test 1: default settings, few tabs
    let stats = soak_sessions(4, 500, PrunerConfig::default()).await;
    stats.print();
    violations += stats.violations;

    // Test 2: no throttle, every scheduled pass runs
    let config = PrunerConfig {
        throttle_ms: 0,
        ..Default::default()
    };
    let stats = soak_sessions(8, 1000, config).await;
    stats.print();
    violations += stats.violations;

    // Test 3: tight store, overflow is routine
    let config = PrunerConfig {
        keep: 6,
        canvas_keep: 3,
        max_stored: 40,
        chunk_size: 8,
        ..Default::default()
    };
    let stats = soak_sessions(8, 1000, config).await;
    stats.print();
    violations += stats.violations;

    // Test 4: many tabs at default settings
    let stats = soak_sessions(32, 2000, PrunerConfig::default()).await;
    stats.print();
    violations += stats.violations;

    // Test 5: scaling analysis
    violations += soak_scaling(400, 100).await;

    if violations == 0 {
        println!("\n✓ All soak tests completed successfully!");
    }
    violations
}
