//! Seed import command.

use std::path::Path;

use anyhow::{anyhow, Context};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

use crate::config::Config;
use crate::repository::{fields_from_json, open_store, Fields};

/// A document to write during import.
#[derive(Debug, PartialEq)]
struct SeedDocument {
    collection: String,
    id: String,
    fields: Fields,
}

/// Import documents from a JSON file of the form
/// `{"<collection>": {"<id>": {...fields}}}`.
pub async fn cmd_import(config: &Config, file: &Path) -> anyhow::Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let seed: Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    let documents = parse_seed(&seed)?;

    let store = open_store(&config.store)?;

    println!(
        "{} Importing {} documents from {}",
        style("→").cyan(),
        documents.len(),
        file.display()
    );

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut failed = 0;
    for doc in &documents {
        pb.set_message(format!("{}/{}", doc.collection, doc.id));
        if let Err(e) = store
            .set_document(&doc.collection, &doc.id, doc.fields.clone())
            .await
        {
            pb.println(format!(
                "{} {}/{}: {}",
                style("✗").red(),
                doc.collection,
                doc.id,
                e
            ));
            failed += 1;
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!(
        "{} Imported {} documents ({} failed)",
        style("✓").green(),
        documents.len() - failed,
        failed
    );

    if failed > 0 {
        return Err(anyhow!("{} documents failed to import", failed));
    }
    Ok(())
}

fn parse_seed(seed: &Value) -> anyhow::Result<Vec<SeedDocument>> {
    let collections = seed
        .as_object()
        .ok_or_else(|| anyhow!("Seed file must be a JSON object of collections"))?;

    let mut documents = Vec::new();
    for (collection, docs) in collections {
        let docs = docs
            .as_object()
            .ok_or_else(|| anyhow!("Collection {} must be an object of documents", collection))?;
        for (id, value) in docs {
            let fields = fields_from_json(value)
                .ok_or_else(|| anyhow!("Document {}/{} must be an object", collection, id))?;
            documents.push(SeedDocument {
                collection: collection.clone(),
                id: id.clone(),
                fields,
            });
        }
    }
    Ok(documents)
}
