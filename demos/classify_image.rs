use anyhow::Result;
use mobilenet_classifier::pipelines::image_classification_pipeline::*;
use mobilenet_classifier::ClassifierConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(image_path) = args.next() else {
        eprintln!("usage: classify_image <image> [config.json]");
        std::process::exit(2);
    };

    // An optional JSON config overrides the model and label locations
    let config = match args.next() {
        Some(path) => ClassifierConfig::from_json_file(path)?,
        None => ClassifierConfig::default(),
    };

    println!("Building pipeline...");
    let pipeline = ImageClassificationPipelineBuilder::from_config(&config)?
        .build()
        .await?;
    println!("Pipeline built successfully.");

    let prediction = pipeline.predict_file(&image_path).await?;

    println!("\n--- Prediction ---");
    println!("Prediction: {}", prediction.label);
    println!("Confidence: {}%", prediction.confidence);
    println!("Class id:   {}", prediction.class_id);

    Ok(())
}
