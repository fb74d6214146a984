mod common;

use common::{encoded_image, png, FixedScores, ScoresOptions};
use mobilenet_classifier::core::live_tensors;
use mobilenet_classifier::pipelines::image_classification_pipeline::*;

fn animals() -> ImageClassificationPipeline<FixedScores> {
    let labels: ClassLabels = ["cat", "dog", "bird"].into_iter().collect();
    ImageClassificationPipeline::new(FixedScores::new(&[0.1, 0.8, 0.1]), labels).unwrap()
}

#[test]
fn classifies_encoded_images_of_any_size() -> anyhow::Result<()> {
    let pipeline = animals();
    for (format, width, height) in [
        (image::ImageFormat::Png, 640, 480),
        (image::ImageFormat::Jpeg, 31, 97),
        (image::ImageFormat::Bmp, 1, 1),
    ] {
        let prediction = pipeline.predict_bytes(&encoded_image(format, width, height))?;
        assert_eq!(prediction.label, "dog");
        assert_eq!(prediction.confidence, 80);
    }
    Ok(())
}

#[test]
fn same_image_gives_same_prediction() -> anyhow::Result<()> {
    let pipeline = animals();
    let bytes = png(300, 200);
    let first = pipeline.predict_bytes(&bytes)?;
    let second = pipeline.predict_bytes(&bytes)?;
    assert_eq!(first, second);
    assert!(pipeline.labels().contains(&first.label));
    Ok(())
}

#[test]
fn predictions_leave_no_tensors_behind() -> anyhow::Result<()> {
    let pipeline = animals();
    let before = live_tensors();
    for _ in 0..3 {
        pipeline.predict_bytes(&png(64, 64))?;
    }
    assert!(pipeline.predict_bytes(b"definitely not an image").is_err());
    assert_eq!(live_tensors(), before);
    Ok(())
}

#[test]
fn data_uri_round_trips_through_the_decoder() -> anyhow::Result<()> {
    let uri = to_data_uri("image/png", &png(5, 7));
    let image = decode_data_uri(&uri)?;
    assert_eq!((image.width(), image.height()), (5, 7));

    let prediction = animals().predict(&image)?;
    assert_eq!(prediction.class_id, 1);
    Ok(())
}

#[tokio::test]
async fn predicts_from_a_file_on_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pet.png");
    std::fs::write(&path, png(120, 90))?;

    let prediction = animals().predict_file(&path).await?;
    assert_eq!(prediction.label, "dog");

    assert!(animals().predict_file(dir.path().join("missing.png")).await.is_err());
    Ok(())
}

#[tokio::test]
async fn builder_pairs_model_and_inline_labels() -> anyhow::Result<()> {
    common::init_tracing();

    let pipeline = ImageClassificationPipelineBuilder::<FixedScores>::new(ScoresOptions(vec![
        0.05, 0.15, 0.7, 0.1,
    ]))
    .cpu()
    .labels(LabelSource::Inline(
        ["tench", "goldfish", "great white shark", "tiger shark"]
            .map(String::from)
            .to_vec(),
    ))
    .build()
    .await?;

    let prediction = pipeline.predict_bytes(&png(10, 10))?;
    assert_eq!(prediction.label, "great white shark");
    assert_eq!(prediction.confidence, 70);
    Ok(())
}

#[tokio::test]
async fn builder_rejects_labels_that_do_not_match_the_model() {
    let result = ImageClassificationPipelineBuilder::<FixedScores>::new(ScoresOptions(vec![
        0.5, 0.5, 0.0,
    ]))
    .cpu()
    .labels(LabelSource::Inline(vec!["heads".into(), "tails".into()]))
    .build()
    .await;

    let err = result.err().expect("mismatched labels must fail");
    assert!(matches!(
        err.downcast_ref::<ClassifierError>(),
        Some(ClassifierError::ClassCountMismatch { expected: 2, got: 3 })
    ));
}

#[tokio::test]
#[ignore = "downloads MobileNetV3 weights and ImageNet labels"]
async fn mobilenet_v3_classifies_a_real_photo_shape() -> anyhow::Result<()> {
    common::init_tracing();

    let pipeline = ImageClassificationPipelineBuilder::mobilenet_v3()
        .cpu()
        .build()
        .await?;
    assert_eq!(pipeline.labels().len(), 1000);

    let prediction = pipeline.predict_bytes(&png(400, 300))?;
    assert!(pipeline.labels().contains(&prediction.label));
    assert!(prediction.confidence <= 100);
    assert!((0.0..=1.0).contains(&prediction.score));
    Ok(())
}
