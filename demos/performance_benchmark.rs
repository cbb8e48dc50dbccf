//! 性能基准：运行 `cargo run --release --example performance_benchmark`

use lazyi18n::model::performance::run_performance_suite;
use tracing_subscriber::fmt::SubscriberBuilder;

fn main() {
    let _ = SubscriberBuilder::default()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let results = run_performance_suite();
    let mut failed = 0;
    for r in &results {
        let mark = if r.success { "✓" } else { "✗" };
        println!("{} {:<24} {:>6}ms  {}", mark, r.operation, r.duration_ms, r.details);
        if !r.success {
            failed += 1;
        }
    }
    println!("共 {} 项，失败 {} 项", results.len(), failed);
    if failed > 0 {
        std::process::exit(1);
    }
}
