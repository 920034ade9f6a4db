use stress_test::{stress_test_scaling, stress_test_session};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            SESSION STRESS TESTS                             ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut diverged = 0;

    // Test 1: a few editors
    let stats = stress_test_session(3, 200).await?;
    stats.print();
    diverged += usize::from(!stats.converged) + stats.inconsistent_documents;

    // Test 2: many editors
    let stats = stress_test_session(12, 300).await?;
    stats.print();
    diverged += usize::from(!stats.converged) + stats.inconsistent_documents;

    // Test 3: scaling analysis
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║          SCALING ANALYSIS                                   ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    stress_test_scaling(16, 4).await?;

    if diverged > 0 {
        return Err(format!("{} participants or documents diverged", diverged).into());
    }

    println!("\n✓ All stress tests completed successfully!");
    Ok(())
}
