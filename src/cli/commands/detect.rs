//! One-off interactive detection.

use console::style;

use crate::config::Config;
use crate::services::{CallerIdentity, DetectService, DetectWebRequest};

/// Run the interactive flow once and print the response as JSON.
pub async fn cmd_detect(
    config: &Config,
    doc: Option<String>,
    url: Option<String>,
    uid: String,
) -> anyhow::Result<()> {
    let images = super::open_images(config)?;
    let detector = super::open_detector(config)?;
    let service = DetectService::new(images, detector, config.storage.clone());

    let request = DetectWebRequest {
        image_doc_id: doc.filter(|d| !d.is_empty()),
        image_url: url.filter(|u| !u.is_empty()),
    };
    let caller = CallerIdentity::new(uid);

    match service.detect(Some(&caller), &request).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {} {}", style("✗").red(), style(e.status()).bold(), e);
            if let Some(details) = e.details() {
                eprintln!("  {}", style(details).dim());
            }
            Err(e.into())
        }
    }
}
