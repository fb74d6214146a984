mod common;

use common::{FixedScores, ScoresOptions};
use mobilenet_classifier::pipelines::image_classification_pipeline::*;
use mobilenet_classifier::core::ServiceCell;
use mobilenet_classifier::ClassifierConfig;
use std::time::Duration;

#[test]
fn global_classifier_starts_uninitialized() {
    let classifier = global_classifier();
    assert_eq!(classifier.readiness(), Readiness::Uninitialized);

    let err = classifier.get().err().expect("nothing has been loaded");
    assert!(matches!(
        err.downcast_ref::<ClassifierError>(),
        Some(ClassifierError::NotReady(Readiness::Uninitialized))
    ));
}

#[tokio::test]
async fn service_becomes_ready_after_build() -> anyhow::Result<()> {
    let service: ClassifierService<FixedScores> = ServiceCell::new();
    let mut readiness = service.subscribe();

    let builder = ImageClassificationPipelineBuilder::<FixedScores>::new(ScoresOptions(vec![
        0.9, 0.1,
    ]))
    .cpu()
    .labels(LabelSource::Inline(vec!["hotdog".into(), "not hotdog".into()]));

    let pipeline = service.start(builder.build()).await?;
    assert_eq!(*readiness.borrow_and_update(), Readiness::Ready);
    assert_eq!(pipeline.labels().get(0), Some("hotdog"));
    assert!(service.is_ready());
    Ok(())
}

#[tokio::test]
async fn waiters_see_the_pipeline_once_loading_finishes() -> anyhow::Result<()> {
    let service: ClassifierService<FixedScores> = ServiceCell::new();

    let loader = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let labels: ClassLabels = ["only"].into_iter().collect();
        ImageClassificationPipeline::new(FixedScores::new(&[1.0]), labels)
    };

    let (started, waited) = tokio::join!(service.start(loader), service.wait_ready());
    assert_eq!(started?.labels().len(), 1);
    assert_eq!(waited?.labels().len(), 1);
    Ok(())
}

#[tokio::test]
async fn missing_local_artifact_leaves_the_service_failed() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClassifierConfig {
        model_dir: Some(dir.path().to_path_buf()),
        labels_path: Some(dir.path().join("labels.json")),
        ..ClassifierConfig::default()
    };

    let service: ClassifierService = ServiceCell::new();
    let result = service
        .start(
            ImageClassificationPipelineBuilder::from_config(&config)
                .unwrap()
                .cpu()
                .build(),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(service.readiness(), Readiness::Failed);
    assert!(service.failure().is_some());

    let err = service.wait_ready().await.err().unwrap();
    assert!(matches!(
        err.downcast_ref::<ClassifierError>(),
        Some(ClassifierError::LoadFailed(_))
    ));
}
