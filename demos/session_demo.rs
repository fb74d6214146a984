use anyhow::Result;
use mobilenet_classifier::pipelines::image_classification_pipeline::*;
use mobilenet_classifier::session::{ClassifierSession, DropZone, SubmittedFile};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let paths: Vec<String> = std::env::args().skip(1).collect();

    let classifier = global_classifier();
    let session = ClassifierSession::new(classifier, DropZone::default());

    // Print every screen update, the way a front end would redraw
    let mut screen = session.subscribe();
    let printer = tokio::spawn(async move {
        while screen.changed().await.is_ok() {
            println!("{}\n", screen.borrow_and_update().render());
        }
    });

    // Dropping a file before the model is up gets an explicit "not ready"
    if let Some(first) = paths.first() {
        let file = SubmittedFile::from_path(first).await?;
        if let Err(e) = session.submit(vec![file]).await {
            println!("early drop: {e}");
        }
    }

    println!("Loading MobileNetV3 and ImageNet labels...");
    classifier
        .start(ImageClassificationPipelineBuilder::mobilenet_v3().build())
        .await?;

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(SubmittedFile::from_path(path).await?);
    }

    // The drop zone only takes one image at a time
    if files.len() > 1 {
        if let Err(e) = session.submit(files.clone()).await {
            println!("rejected: {e}");
        }
    }

    for file in files {
        if let Err(e) = session.submit(vec![file]).await {
            println!("classification failed: {e:#}");
        }
    }

    // Clearing the drop zone clears the chips
    session.submit(Vec::new()).await?;

    drop(session);
    printer.await?;
    Ok(())
}
