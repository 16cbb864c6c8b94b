//! End-to-end pipeline tests: trigger through analyses to stored report.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::{ImageFormat, Rgb, RgbImage};
use itertools::Itertools;
use serde_json::json;

use lumina_analyses::{colors, persist, report, ImageAnalysisWorkflow, TriggerEvent, ANALYSES};
use lumina_engine::{
    ActivityRegistry, Decision, FailingActivity, FlakyActivity, Runtime, WorkflowDefinition,
};
use lumina_history::{
    HistoryEvent, HistoryLog, HistoryStore, InMemoryHistoryStore, InMemoryResultStore,
    InstanceStatus, ResultStore, TaskId,
};

fn jpeg_trigger(width: u32, height: u32, file_name: &str) -> TriggerEvent {
    let mut image = RgbImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        *pixel = Rgb([(x % 256) as u8, (y % 256) as u8, 96]);
    }
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    TriggerEvent::new(file_name, bytes, "delivery-1")
}

fn runtime_with(registry: ActivityRegistry) -> (Runtime, Arc<InMemoryHistoryStore>) {
    let history = Arc::new(InMemoryHistoryStore::new());
    let runtime = Runtime::new(
        history.clone(),
        Arc::new(ImageAnalysisWorkflow),
        Arc::new(registry),
    );
    (runtime, history)
}

#[tokio::test]
async fn test_cat_jpg_end_to_end() {
    let results: Arc<InMemoryResultStore> = Arc::new(InMemoryResultStore::new());
    let history = Arc::new(InMemoryHistoryStore::new());
    let runtime = Runtime::new(
        history.clone(),
        Arc::new(ImageAnalysisWorkflow),
        Arc::new(ImageAnalysisWorkflow::registry(results.clone())),
    );

    let trigger = jpeg_trigger(1920, 1080, "cat.jpg");
    let id = trigger.instance_id();
    assert!(runtime
        .start_instance(id, &trigger.file_name, trigger.input())
        .await
        .unwrap());

    let record = runtime
        .run_to_completion(id, Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(record.status, InstanceStatus::Completed);

    let output = record.output.unwrap();
    assert_eq!(output["status"], "stored");
    assert_eq!(output["fileName"], "cat.jpg");
    assert_eq!(output["id"], id.to_string());

    let stored = results.get(&id.to_string()).await.unwrap().unwrap();
    let summary = &stored.report["summary"];
    assert_eq!(summary["imageSize"], "1920x1080");
    assert_eq!(summary["format"], "JPEG");
    assert_eq!(summary["objectsDetected"], 3);
    assert_eq!(summary["hasText"], false);
    assert_eq!(stored.report["analyses"]["metadata"]["totalPixels"], 2_073_600);
    assert_eq!(stored.report["blobPath"], "images/cat.jpg");

    // Six scheduling events: four analyses, report, persist.
    let log = history.load_history(id).await.unwrap();
    assert_eq!(log.scheduled_count(), 6);
}

#[tokio::test]
async fn test_fan_in_is_order_independent() {
    let workflow = ImageAnalysisWorkflow;
    let input = json!({
        "id": "instance-1",
        "fileName": "cat.jpg",
        "blobPath": "images/cat.jpg",
        "imageData": "",
        "sizeKb": 4.0,
    });

    let mut joined_inputs = Vec::new();
    for order in (0..ANALYSES.len()).permutations(ANALYSES.len()) {
        let mut log = HistoryLog::new();
        let Decision::Schedule(requests) = workflow.plan(&input, &log) else {
            panic!("expected initial fan-out");
        };
        for (seq, request) in requests.iter().enumerate() {
            log.append(HistoryEvent::scheduled(
                TaskId::from_seq(seq as u64),
                request.activity.clone(),
                request.input.clone(),
                request.attempt,
            ))
            .unwrap();
        }

        for index in order {
            log.append(HistoryEvent::completed(
                TaskId::from_seq(index as u64),
                json!({"from": ANALYSES[index]}),
            ))
            .unwrap();
        }

        let Decision::Schedule(next) = workflow.plan(&input, &log) else {
            panic!("expected report scheduling");
        };
        assert_eq!(next[0].activity, report::NAME);
        joined_inputs.push(next[0].input.clone());
    }

    // All 24 completion orders produce the identical joined report input.
    assert_eq!(joined_inputs.len(), 24);
    assert!(joined_inputs.iter().all(|j| j == &joined_inputs[0]));
}

#[tokio::test]
async fn test_transient_color_failure_recovers_on_retry() {
    let results: Arc<InMemoryResultStore> = Arc::new(InMemoryResultStore::new());
    let mut registry = ImageAnalysisWorkflow::registry(results.clone());
    registry.register(Arc::new(FlakyActivity::new(
        Arc::new(colors::ColorAnalyzer),
        1,
    )));
    let (runtime, history) = runtime_with(registry);

    let trigger = jpeg_trigger(320, 240, "flaky.jpg");
    let id = trigger.instance_id();
    runtime
        .start_instance(id, &trigger.file_name, trigger.input())
        .await
        .unwrap();
    let record = runtime
        .run_to_completion(id, Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(record.status, InstanceStatus::Completed);
    let log = history.load_history(id).await.unwrap();
    assert_eq!(log.attempts(colors::NAME), 2);
    // Exactly one terminal event per scheduled task, including the failed
    // first attempt.
    assert!(log.pending_tasks().is_empty());
}

#[tokio::test]
async fn test_persistent_color_failure_retains_sibling_outputs() {
    let results: Arc<InMemoryResultStore> = Arc::new(InMemoryResultStore::new());
    let mut registry = ImageAnalysisWorkflow::registry(results.clone());
    registry.register(Arc::new(FailingActivity::new(
        colors::NAME,
        "decoder exploded",
    )));
    let (runtime, _history) = runtime_with(registry);

    let trigger = jpeg_trigger(320, 240, "broken.jpg");
    let id = trigger.instance_id();
    runtime
        .start_instance(id, &trigger.file_name, trigger.input())
        .await
        .unwrap();
    let record = runtime
        .run_to_completion(id, Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(record.status, InstanceStatus::Failed);
    let failure = record.failure.unwrap();
    assert!(failure.failed[colors::NAME].contains("decoder exploded"));
    // The three healthy analyses ran to completion and their outputs are
    // retained alongside the failure.
    for name in ["analyze_objects", "analyze_text", "analyze_metadata"] {
        assert!(failure.partial.contains_key(name), "missing {name}");
    }
    assert_eq!(failure.partial["analyze_metadata"]["width"], 320);

    // Nothing was persisted for the failed instance.
    assert!(results.get(&id.to_string()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_retry_policy_shape() {
    let workflow = ImageAnalysisWorkflow;
    assert_eq!(workflow.retry_policy(colors::NAME).max_attempts, 2);
    assert_eq!(workflow.retry_policy("generate_report").max_attempts, 1);
    assert_eq!(workflow.retry_policy(persist::NAME).max_attempts, 3);
}
