use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use assetflow::core::{ConnectionClass, RuntimeConfig, StaticProbe};
use assetflow::frame::TaskPriority;
use assetflow::loading::mock::{MockRoute, MockSource};
use assetflow::loading::{AssetDescriptor, AssetKind, AssetPriority};
use assetflow::quality::QualityLevel;
use assetflow::resource::BudgetConfig;
use assetflow::RuntimeContext;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;

fn slow_runtime(source: MockSource, total: u64) -> (RuntimeContext, Arc<MockSource>) {
    let config = RuntimeConfig {
        budget: BudgetConfig { total_bytes: Some(total), ..Default::default() },
        ..Default::default()
    };
    let source = Arc::new(source);
    let runtime = RuntimeContext::new(
        config,
        Arc::new(StaticProbe::new(ConnectionClass::Slow, 64 * MB)),
        source.clone(),
    );
    (runtime, source)
}

#[tokio::test(start_paused = true)]
async fn test_mixed_priority_load_under_budget() {
    let source = MockSource::new()
        .with_delay(Duration::from_millis(20))
        .serve("hero.png", vec![0u8; 16])
        .route("ship.glb", MockRoute::Flaky { remaining: 2, bytes: vec![1u8; 16] })
        .serve("wind.ogg", vec![2u8; 16])
        .serve("rain.ogg", vec![3u8; 16])
        .fail("broken.ogg");
    let (mut runtime, source) = slow_runtime(source, 2 * MB);

    let loaded_counts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&loaded_counts);
    runtime
        .pipeline_mut()
        .on_progress(move |progress| sink.lock().unwrap().push(progress.loaded_count));

    let pipeline = runtime.pipeline_mut();
    pipeline.enqueue(
        AssetDescriptor::new("hero", "hero.png", AssetKind::Texture, 200 * KB)
            .with_priority(AssetPriority::Critical),
    );
    pipeline.enqueue(
        AssetDescriptor::new("ship", "ship.glb", AssetKind::Model, MB)
            .with_priority(AssetPriority::High),
    );
    for clip in ["wind", "rain", "broken"] {
        pipeline.enqueue(
            AssetDescriptor::new(clip, format!("{}.ogg", clip), AssetKind::Audio, 100 * KB)
                .with_priority(AssetPriority::Low),
        );
    }

    let report = runtime.load().await;

    assert_eq!(report.progress.loaded_count, 4);
    assert_eq!(report.progress.failed_count, 1);
    assert_eq!(runtime.pipeline().failed_count(), 1);
    assert!(!report.assets.contains_key("broken"));
    assert_eq!(source.calls("ship.glb"), 3);
    assert_eq!(source.calls("broken.ogg"), 3);
    assert!(source.peak_in_flight() <= 2);

    let stats = runtime.memory_stats();
    assert!(stats.total_used_bytes <= 2 * MB);
    let class_sum: u64 = stats.classes.iter().map(|usage| usage.used_bytes).sum();
    assert_eq!(class_sum, stats.total_used_bytes);

    let counts = loaded_counts.lock().unwrap();
    assert_eq!(counts.len(), 5);
    assert!(counts.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(counts.last(), Some(&4));
}

#[tokio::test(start_paused = true)]
async fn test_blocking_assets_finish_before_background_starts() {
    let source = MockSource::new()
        .with_delay(Duration::from_millis(50))
        .route("slow_critical.png", MockRoute::Flaky { remaining: 1, bytes: vec![0u8] })
        .serve("high.png", vec![0u8])
        .serve("bg0.png", vec![0u8])
        .serve("bg1.png", vec![0u8])
        .serve("bg2.png", vec![0u8]);
    let (mut runtime, source) = slow_runtime(source, 64 * MB);

    let pipeline = runtime.pipeline_mut();
    for i in 0..3 {
        pipeline.enqueue(
            AssetDescriptor::new(format!("bg{}", i), format!("bg{}.png", i), AssetKind::Texture, KB)
                .with_priority(AssetPriority::Medium),
        );
    }
    pipeline.enqueue(
        AssetDescriptor::new("high", "high.png", AssetKind::Texture, KB)
            .with_priority(AssetPriority::High),
    );
    pipeline.enqueue(
        AssetDescriptor::new("critical", "slow_critical.png", AssetKind::Texture, KB)
            .with_priority(AssetPriority::Critical),
    );

    runtime.load().await;

    let log = source.call_log();
    let first_background = log.iter().position(|url| url.starts_with("bg")).unwrap();
    let last_blocking = log.iter().rposition(|url| !url.starts_with("bg")).unwrap();
    assert!(last_blocking < first_background);
    assert_eq!(&log[..3], &["slow_critical.png", "slow_critical.png", "high.png"]);
}

#[test]
fn test_frame_loop_survives_failing_task_and_adapts_quality() {
    let (mut runtime, _) = slow_runtime(MockSource::new(), 64 * MB);
    let runs = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&runs);

    let scheduler = runtime.scheduler_mut();
    scheduler.add_task("broken", TaskPriority::High, None, |_, _| {
        Err(assetflow::core::Error::task("shader missing"))
    });
    scheduler.add_task("animate", TaskPriority::Medium, None, move |_, _| {
        *counter.lock().unwrap() += 1;
        Ok(())
    });

    // ~40 fps: Medium quality
    let start = Instant::now();
    for frame in 0..10u32 {
        runtime.frame(start + Duration::from_millis(25) * frame);
    }

    assert_eq!(*runs.lock().unwrap(), 10);
    assert!(!runtime.scheduler().task_info("broken").unwrap().enabled);
    assert_eq!(runtime.quality_level(), QualityLevel::Medium);
    assert_eq!(runtime.performance_metrics().disabled_tasks, 1);
}
